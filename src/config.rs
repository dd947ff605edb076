use crate::error::{TreeError, TreeResult};

/// Tunable contention constants, overridable per-tree at construction.
///
/// Defaults match the values used by Winblad, Sagonas & Jonsson's
/// contention-adapting search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    pub cont_contrib: i32,
    pub low_cont_contrib: i32,
    pub range_contrib: i32,
    pub high_cont: i32,
    pub low_cont: i32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cont_contrib: 250,
            low_cont_contrib: 1,
            range_contrib: 100,
            high_cont: 1000,
            low_cont: -1000,
        }
    }
}

impl TreeConfig {
    pub fn with_cont_contrib(mut self, v: i32) -> Self {
        self.cont_contrib = v;
        self
    }

    pub fn with_low_cont_contrib(mut self, v: i32) -> Self {
        self.low_cont_contrib = v;
        self
    }

    pub fn with_range_contrib(mut self, v: i32) -> Self {
        self.range_contrib = v;
        self
    }

    pub fn with_high_cont(mut self, v: i32) -> Self {
        self.high_cont = v;
        self
    }

    pub fn with_low_cont(mut self, v: i32) -> Self {
        self.low_cont = v;
        self
    }

    pub fn validate(&self) -> TreeResult<()> {
        if self.low_cont >= self.high_cont {
            return Err(TreeError::BadContentionBounds {
                low_cont: self.low_cont,
                high_cont: self.high_cont,
            });
        }
        for (field, value) in [
            ("cont_contrib", self.cont_contrib),
            ("low_cont_contrib", self.low_cont_contrib),
            ("range_contrib", self.range_contrib),
        ] {
            if value < 0 {
                return Err(TreeError::NegativeContribution { field, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        TreeConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_bounds() {
        let cfg = TreeConfig::default().with_low_cont(2000).with_high_cont(1000);
        assert_eq!(
            cfg.validate(),
            Err(TreeError::BadContentionBounds {
                low_cont: 2000,
                high_cont: 1000,
            })
        );
    }

    #[test]
    fn rejects_negative_contribution() {
        let cfg = TreeConfig::default().with_cont_contrib(-1);
        assert_eq!(
            cfg.validate(),
            Err(TreeError::NegativeContribution {
                field: "cont_contrib",
                value: -1,
            })
        );
    }

    #[test]
    fn builder_methods_compose() {
        let cfg = TreeConfig::default()
            .with_cont_contrib(10)
            .with_low_cont_contrib(2)
            .with_range_contrib(5)
            .with_high_cont(100)
            .with_low_cont(-100);
        assert_eq!(cfg.cont_contrib, 10);
        assert_eq!(cfg.low_cont_contrib, 2);
        assert_eq!(cfg.range_contrib, 5);
        assert_eq!(cfg.high_cont, 100);
        assert_eq!(cfg.low_cont, -100);
        cfg.validate().unwrap();
    }
}
