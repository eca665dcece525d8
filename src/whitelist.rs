use std::path::Path;

use ahash::AHashSet;

/// The set of valid molecular barcodes, loaded once per run and read-only
/// afterwards. A read whose UMI is not in the set is rejected before it can
/// open or join a duplicate group.
#[derive(Debug, Default)]
pub struct UmiWhitelist(AHashSet<String>);

impl UmiWhitelist {
    pub async fn from_path<P: AsRef<Path>>(path: P) -> std::io::Result<UmiWhitelist> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(text.lines().collect())
    }

    pub fn contains(&self, umi: &str) -> bool {
        self.0.contains(umi)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for UmiWhitelist {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> UmiWhitelist {
        UmiWhitelist(
            iter.into_iter()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_skips_blank_lines() {
        let whitelist: UmiWhitelist = "ACGT\nTTAA \n\n  \nGGCC".lines().collect();
        assert_eq!(whitelist.len(), 3);
        assert!(whitelist.contains("ACGT"));
        assert!(whitelist.contains("TTAA"));
        assert!(whitelist.contains("GGCC"));
        assert!(!whitelist.contains(""));
        assert!(!whitelist.contains("AAAA"));
    }
}
