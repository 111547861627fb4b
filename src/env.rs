use crate::table::{ScenarioTable, TableError};

/// Column of an environment table holding the variable name.
pub const NAME_COLUMN: &str = "val";

/// Column of an environment table holding the variable value.
pub const VALUE_COLUMN: &str = "var";

/// Environment variables set for a spawned process on top of the inherited environment.
///
/// Insertion order is kept. A later override of the same variable wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: Vec<(String, String)>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from a table like
    ///
    /// ```text
    /// | val                                             | var   |
    /// | CCX_NOTIFICATION_SERVICE__KAFKA_BROKER__ENABLED | false |
    /// ```
    pub fn from_table(table: &ScenarioTable) -> Result<Self, TableError> {
        let mut overrides = Self::new();
        for row in table.rows() {
            overrides.set(row.get(NAME_COLUMN)?, row.get(VALUE_COLUMN)?);
        }
        Ok(overrides)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.push((name.into(), value.into()));
        self
    }

    /// Value the spawned process will see for `name`, if overridden.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn apply(&self, cmd: &mut tokio::process::Command) {
        cmd.envs(self.iter());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvOverrides {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
