//! Option descriptors parsed from `Flags:` and `Global Flags:` sections.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One flag of the wrapped program, with all of its synonym spellings.
///
/// Flags are kept in help-text order: the long form first, then the short
/// form if there is one. A descriptor takes a value when the help text names
/// one (`--stack string`).
///
/// Equality is structural over the flag list and value arity; descriptions
/// are ignored. Use [`equivalent`](OptionDescriptor::equivalent) for other
/// comparison strictness.
///
/// # Examples
///
/// ```
/// use help_mirror_core::OptionDescriptor;
///
/// let stack = OptionDescriptor::new(["--stack", "-s"], Some("string"), "The name of the stack");
/// assert!(stack.has_value());
/// assert!(stack.matches("-s"));
/// assert_eq!(stack.canonical_flag(), "--stack");
///
/// let yes = OptionDescriptor::boolean(["--yes", "-y"], "Automatically approve");
/// assert!(!yes.has_value());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDescriptor {
    flags: Vec<String>,
    value_name: Option<String>,
    description: String,
}

impl OptionDescriptor {
    /// Creates a descriptor. A `Some` value name makes the option take a value.
    pub fn new<I, S>(flags: I, value_name: Option<&str>, description: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
            value_name: value_name.map(String::from),
            description: description.to_string(),
        }
    }

    /// Creates a descriptor for a valueless flag.
    pub fn boolean<I, S>(flags: I, description: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(flags, None, description)
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn value_name(&self) -> Option<&str> {
        self.value_name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns `true` if the option consumes a value.
    pub fn has_value(&self) -> bool {
        self.value_name.is_some()
    }

    /// Returns the first listed spelling (the long form for parsed help text).
    pub fn canonical_flag(&self) -> &str {
        self.flags.first().map(String::as_str).unwrap_or("")
    }

    /// Checks whether `flag` is one of this option's spellings.
    pub fn matches(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Compares two descriptors under the given strictness.
    ///
    /// # Examples
    ///
    /// ```
    /// use help_mirror_core::{DescriptorComparison, OptionDescriptor};
    ///
    /// let a = OptionDescriptor::new(["--stack", "-s"], Some("string"), "The stack");
    /// let b = OptionDescriptor::new(["--stack", "-s"], Some("string"), "Another text");
    /// assert!(a.equivalent(&b, DescriptorComparison::default()));
    /// assert!(!a.equivalent(&b, DescriptorComparison::strict()));
    /// ```
    pub fn equivalent(&self, other: &OptionDescriptor, cmp: DescriptorComparison) -> bool {
        if cmp.flags && self.flags != other.flags {
            return false;
        }
        if cmp.value_arity && self.has_value() != other.has_value() {
            return false;
        }
        if cmp.description && self.description != other.description {
            return false;
        }
        true
    }
}

impl PartialEq for OptionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.equivalent(other, DescriptorComparison::default())
    }
}

impl Eq for OptionDescriptor {}

impl fmt::Display for OptionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flags.join(", "))?;
        if let Some(value_name) = &self.value_name {
            write!(f, " <{value_name}>")?;
        }
        if !self.description.is_empty() {
            write!(f, ": {}", self.description.replace('\n', " "))?;
        }
        Ok(())
    }
}

/// Which attributes take part when descriptors are compared.
///
/// The default ignores description text, which is what descendant-search
/// ambiguity detection uses. [`strict`](Self::strict) compares everything and
/// is used to detect self-inconsistent help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorComparison {
    pub flags: bool,
    pub value_arity: bool,
    pub description: bool,
}

impl Default for DescriptorComparison {
    fn default() -> Self {
        Self {
            flags: true,
            value_arity: true,
            description: false,
        }
    }
}

impl DescriptorComparison {
    pub fn strict() -> Self {
        Self {
            flags: true,
            value_arity: true,
            description: true,
        }
    }

    /// Only value arity matters; differing synonym lists are tolerated.
    pub fn ignore_flags() -> Self {
        Self {
            flags: false,
            value_arity: true,
            description: false,
        }
    }

    /// Any two descriptors for the same spelling are considered the same.
    pub fn ignore_arity() -> Self {
        Self {
            flags: false,
            value_arity: false,
            description: false,
        }
    }
}
