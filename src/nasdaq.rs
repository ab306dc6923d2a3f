//! NASDAQ Trader symbol directory (`nasdaqtraded.txt`).
//!
//! The file is pipe-delimited with a header row and a trailing
//! `File Creation Time: ...` line. Entries are keyed by the `NASDAQ Symbol`
//! column, which is the form Yahoo accepts for most listings.

use crate::data::SymbolListing;
use crate::error::ProviderError;
use tracing::info;

pub struct SymbolDirectory {
    url: String,
}

impl SymbolDirectory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<SymbolListing>, ProviderError> {
        let text = client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let listings = parse_directory(&text)?;
        info!("Loaded {} symbols from {}", listings.len(), self.url);
        Ok(listings)
    }
}

fn column(header: &[&str], names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| header.iter().position(|h| h.trim() == *name))
}

pub fn parse_directory(text: &str) -> Result<Vec<SymbolListing>, ProviderError> {
    let mut lines = text.lines();
    let header: Vec<&str> = lines
        .next()
        .ok_or_else(|| ProviderError::Parse("symbol directory is empty".to_string()))?
        .split('|')
        .collect();

    let symbol_idx = column(&header, &["NASDAQ Symbol", "Symbol"])
        .ok_or_else(|| ProviderError::Parse("symbol directory has no symbol column".to_string()))?;
    let name_idx = column(&header, &["Security Name"])
        .ok_or_else(|| ProviderError::Parse("symbol directory has no Security Name column".to_string()))?;
    let etf_idx = column(&header, &["ETF"]);
    let test_idx = column(&header, &["Test Issue"]);

    let mut listings = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with("File Creation Time") {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        let flag = |idx: Option<usize>| {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim() == "Y")
                .unwrap_or(false)
        };
        if flag(test_idx) {
            continue;
        }
        let (Some(symbol), Some(name)) = (fields.get(symbol_idx), fields.get(name_idx)) else {
            continue;
        };
        let symbol = symbol.trim();
        if symbol.is_empty() {
            continue;
        }
        listings.push(SymbolListing {
            symbol: symbol.to_uppercase(),
            name: name.trim().to_string(),
            etf: flag(etf_idx),
        });
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Nasdaq Traded|Symbol|Security Name|Listing Exchange|Market Category|ETF|Round Lot Size|Test Issue|Financial Status|CQS Symbol|NASDAQ Symbol|NextShares\r
Y|AAPL|Apple Inc. - Common Stock|Q|Q|N|100|N|N||AAPL|N\r
Y|BRK.B|Berkshire Hathaway Inc. New Common Stock|N| |N|100|N||BRK.B|BRK.B|N\r
Y|QQQ|Invesco QQQ Trust, Series 1|Q|G|Y|100|N|N||QQQ|N\r
Y|ZXZZT|NASDAQ TEST STOCK|Q|G|N|100|Y|N||ZXZZT|N\r
File Creation Time: 0319202413:02|||||||||||\r
";

    #[test]
    fn test_parse_directory() {
        let listings = parse_directory(SAMPLE).unwrap();
        let symbols: Vec<&str> = listings.iter().map(|l| l.symbol.as_str()).collect();
        assert_eq!(symbols, ["AAPL", "BRK.B", "QQQ"]);
        assert_eq!(listings[0].name, "Apple Inc. - Common Stock");
        assert!(!listings[0].etf);
        assert!(listings[2].etf);
    }

    #[test]
    fn test_parse_directory_requires_columns() {
        assert!(matches!(parse_directory(""), Err(ProviderError::Parse(_))));
        assert!(matches!(
            parse_directory("Foo|Bar\nA|B\n"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_directory_falls_back_to_symbol_column() {
        let text = "Symbol|Security Name|Market Category|Test Issue|Financial Status|Round Lot Size|ETF|NextShares\nmsft|Microsoft Corporation - Common Stock|Q|N|N|100|N|N\n";
        let listings = parse_directory(text).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].symbol, "MSFT");
    }
}
