use crate::error::ConvertError;
use glob::Pattern;

/// Selects which worksheets of a workbook are converted.
#[derive(Clone, Debug, Default)]
pub struct SheetFilter {
    /// Sheet name patterns; `None` accepts every sheet.
    patterns: Option<Vec<Pattern>>,
}

impl SheetFilter {
    pub fn new(patterns: &[String]) -> Result<Self, ConvertError> {
        if patterns.is_empty() {
            return Ok(Self::default());
        }
        let patterns = patterns
            .iter()
            .map(|pattern| Pattern::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns: Some(patterns) })
    }

    /// True when no patterns are configured or the name matches any of them.
    pub fn accept(&self, sheet_name: &str) -> bool {
        match &self.patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_any_pattern() {
        let filter = SheetFilter::new(&["Rambu*".to_owned(), "Marka".to_owned()]).unwrap();
        assert!(filter.accept("Rambu Eksisting"));
        assert!(filter.accept("Marka"));
        assert!(!filter.accept("RPPJ"));
        assert!(SheetFilter::default().accept("anything"));
        assert!(SheetFilter::new(&["[".to_owned()]).is_err());
    }
}
