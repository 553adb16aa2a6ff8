//! Survey schema model and YAML persistence.
//!
//! A [`SurveySchema`] binds up to four identifier roles (the columns used to
//! segment respondents) and lists every remaining useful column as a
//! [`QuestionDescriptor`]. The serialized layout is:
//!
//! ```yaml
//! identifiers:
//!   grad_type: Degree
//!   grad_year: ''
//!   is_undergrad: ''
//!   undergrad_year: ''
//! useful_columns:
//! - question: Skills
//!   input_type: multi-select
//!   value_type: categorical
//! ```

use std::{collections::HashSet, fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::UnknownEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColumnRole {
    GradType,
    GradYear,
    IsUndergrad,
    UndergradYear,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 4] = [
        ColumnRole::GradType,
        ColumnRole::GradYear,
        ColumnRole::IsUndergrad,
        ColumnRole::UndergradYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::GradType => "grad_type",
            ColumnRole::GradYear => "grad_year",
            ColumnRole::IsUndergrad => "is_undergrad",
            ColumnRole::UndergradYear => "undergrad_year",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["grad_type", "grad_year", "is_undergrad", "undergrad_year"]
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnRole {
    type Err = UnknownEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "grad_type" => Ok(ColumnRole::GradType),
            "grad_year" => Ok(ColumnRole::GradYear),
            "is_undergrad" => Ok(ColumnRole::IsUndergrad),
            "undergrad_year" => Ok(ColumnRole::UndergradYear),
            _ => Err(UnknownEnumError::new(
                "identifier role",
                value,
                ColumnRole::variants(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    SingleSelect,
    MultiSelect,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::SingleSelect => "single-select",
            InputType::MultiSelect => "multi-select",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["single-select", "multi-select"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Categorical,
    Numeric,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Categorical => "categorical",
            ValueType::Numeric => "numeric",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["categorical", "numeric"]
    }
}

impl FromStr for InputType {
    type Err = UnknownEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single-select" | "single" => Ok(InputType::SingleSelect),
            "multi-select" | "multi" => Ok(InputType::MultiSelect),
            _ => Err(UnknownEnumError::new(
                "input type",
                value,
                InputType::variants(),
            )),
        }
    }
}

impl FromStr for ValueType {
    type Err = UnknownEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "categorical" => Ok(ValueType::Categorical),
            "numeric" => Ok(ValueType::Numeric),
            _ => Err(UnknownEnumError::new(
                "value type",
                value,
                ValueType::variants(),
            )),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! token_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let token = String::deserialize(deserializer)?;
                <$ty>::from_str(&token).map_err(serde::de::Error::custom)
            }
        }
    };
}

token_serde!(ColumnRole);
token_serde!(InputType);
token_serde!(ValueType);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    pub question: String,
    pub input_type: InputType,
    pub value_type: ValueType,
}

/// Identifier role bindings. An unbound role is written as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(default, with = "empty_as_none")]
    pub grad_type: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub grad_year: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub is_undergrad: Option<String>,
    #[serde(default, with = "empty_as_none")]
    pub undergrad_year: Option<String>,
}

impl Identifiers {
    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.slot(role).as_deref()
    }

    /// Binds `role` to `column`, returning the column it was bound to before.
    pub fn bind(&mut self, role: ColumnRole, column: &str) -> Option<String> {
        self.slot_mut(role).replace(column.to_string())
    }

    /// Bound roles in role order.
    pub fn bound(&self) -> Vec<(ColumnRole, &str)> {
        ColumnRole::ALL
            .iter()
            .filter_map(|role| self.get(*role).map(|column| (*role, column)))
            .collect()
    }

    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        ColumnRole::ALL
            .into_iter()
            .find(|role| self.get(*role) == Some(column))
    }

    fn slot(&self, role: ColumnRole) -> &Option<String> {
        match role {
            ColumnRole::GradType => &self.grad_type,
            ColumnRole::GradYear => &self.grad_year,
            ColumnRole::IsUndergrad => &self.is_undergrad,
            ColumnRole::UndergradYear => &self.undergrad_year,
        }
    }

    fn slot_mut(&mut self, role: ColumnRole) -> &mut Option<String> {
        match role {
            ColumnRole::GradType => &mut self.grad_type,
            ColumnRole::GradYear => &mut self.grad_year,
            ColumnRole::IsUndergrad => &mut self.is_undergrad,
            ColumnRole::UndergradYear => &mut self.undergrad_year,
        }
    }
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySchema {
    #[serde(default)]
    pub identifiers: Identifiers,
    #[serde(default)]
    pub useful_columns: Vec<QuestionDescriptor>,
}

impl SurveySchema {
    pub fn question(&self, name: &str) -> Option<&QuestionDescriptor> {
        self.useful_columns.iter().find(|q| q.question == name)
    }

    /// A column may not be both an identifier and a question, nor a
    /// question twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for descriptor in &self.useful_columns {
            if let Some(role) = self.identifiers.role_of(&descriptor.question) {
                bail!(
                    "Column '{}' is bound to identifier '{}' and also listed as a question",
                    descriptor.question,
                    role
                );
            }
            if !seen.insert(descriptor.question.as_str()) {
                bail!("Question '{}' is listed more than once", descriptor.question);
            }
        }
        Ok(())
    }

    /// Checks that every referenced column exists in `headers`.
    pub fn validate_headers(&self, headers: &[&str]) -> Result<()> {
        let known: HashSet<&str> = headers.iter().copied().collect();
        for (role, column) in self.identifiers.bound() {
            if !known.contains(column) {
                bail!("Identifier '{role}' references missing column '{column}'");
            }
        }
        for descriptor in &self.useful_columns {
            if !known.contains(descriptor.question.as_str()) {
                bail!(
                    "Question '{}' is not a column of the survey",
                    descriptor.question
                );
            }
        }
        Ok(())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing schema to YAML string")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let file = File::create(path).with_context(|| format!("Creating schema file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing schema YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: SurveySchema =
            serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        schema.validate()?;
        Ok(schema)
    }
}
