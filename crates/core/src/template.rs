//! Template rendering for manifest fields.
//!
//! Fields are rendered with `minijinja` against a [`TemplateContext`]:
//! `{{ Name }}`, `{{ Version }}`, `{{ Exe }}`, `{{ Output }}`,
//! `{{ Env.HOME }}`, `{{ Values.key }}` and the platform keys `OS`, `ARCH`,
//! `ARCH_VERSION`, `ARCH_LONG`, `LIBRARY`, `EXTENSION`, `DISTRIBUTION`.

use minijinja::Environment;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::platform::Platform;
use crate::{Error, Result};

/// Values exposed to templates.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub name: String,
    pub version: String,
    pub exe: String,
    pub output: String,
    pub env: BTreeMap<String, String>,
    pub values: BTreeMap<String, serde_yaml::Value>,
    #[serde(flatten)]
    pub platform: BTreeMap<&'static str, String>,
}

impl TemplateContext {
    /// Set the platform keys from a resolved platform.
    #[must_use]
    pub fn with_platform(mut self, platform: &Platform) -> Self {
        self.platform = platform.template_values();
        self
    }
}

/// Renders template strings.
pub struct Templater {
    env: Environment<'static>,
}

impl Default for Templater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Templater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Templater").finish_non_exhaustive()
    }
}

impl Templater {
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_filter("trimprefix", |value: &str, prefix: &str| -> String {
            value.strip_prefix(prefix).unwrap_or(value).to_string()
        });
        env.add_filter("trimsuffix", |value: &str, suffix: &str| -> String {
            value.strip_suffix(suffix).unwrap_or(value).to_string()
        });
        Self { env }
    }

    /// Render a single template string.
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String> {
        if !template.contains("{{") && !template.contains("{%") {
            return Ok(template.to_string());
        }
        self.env
            .render_str(template, ctx)
            .map_err(|e| Error::template(template, e.to_string()))
    }

    /// Render a string field in place.
    pub fn apply(&self, field: &mut String, ctx: &TemplateContext) -> Result<()> {
        let rendered = self.render(field, ctx)?;
        *field = rendered;
        Ok(())
    }

    /// Render every string in a list in place.
    pub fn apply_all<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a mut String>,
        ctx: &TemplateContext,
    ) -> Result<()> {
        for field in fields {
            self.apply(field, ctx)?;
        }
        Ok(())
    }
}

/// A field holding template source text and, once rendered, a parsed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Template<T> {
    template: String,
    value: Option<T>,
}

impl<T> Default for Template<T> {
    fn default() -> Self {
        Self {
            template: String::new(),
            value: None,
        }
    }
}

impl<T: FromStr> Template<T>
where
    T::Err: std::fmt::Display,
{
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            value: None,
        }
    }

    /// No template text has been provided.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.template.trim().is_empty()
    }

    /// Replace the template text, discarding any parsed value.
    pub fn set(&mut self, template: impl Into<String>) {
        self.template = template.into();
        self.value = None;
    }

    /// Render the template and parse the result.
    ///
    /// An empty rendering leaves the value unset.
    pub fn parse(&mut self, templater: &Templater, ctx: &TemplateContext) -> Result<()> {
        let rendered = templater.render(&self.template, ctx)?;
        let trimmed = rendered.trim();
        if trimmed.is_empty() {
            self.value = None;
            return Ok(());
        }
        let value = trimmed
            .parse::<T>()
            .map_err(|e| Error::template(&self.template, format!("{trimmed:?}: {e}")))?;
        self.value = Some(value);
        Ok(())
    }

    /// The parsed value, if [`Template::parse`] produced one.
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.template
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl<'de, T> Deserialize<'de> for Template<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let template = match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Str(s) => s,
        };
        Ok(Self {
            template,
            value: None,
        })
    }
}

impl<T> Serialize for Template<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.template)
    }
}
