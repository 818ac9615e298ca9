use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed version {input:?}: component {component:?} is not numeric")]
pub struct MalformedVersionError {
    pub input: String,
    pub component: String,
}

/// Dotted-numeric version, ordered component-wise.
///
/// Parsing strips a single leading non-numeric tag prefix (`v1.2.0` and
/// `1.2.0` are the same version). Tuples of unequal length compare as if the
/// shorter were padded with zeros, so `1.2` and `1.2.0` are equal; that
/// padding policy is deliberate and matched by `PartialEq` and `Hash`.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl FromStr for Version {
    type Err = MalformedVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches(|c: char| !c.is_ascii_digit());
        if digits.is_empty() {
            return Err(MalformedVersionError {
                input: s.to_string(),
                component: digits.to_string(),
            });
        }

        let components = digits
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| MalformedVersionError {
                    input: s.to_string(),
                    component: part.to_string(),
                })
            })
            .collect::<Result<Vec<u64>, _>>()?;

        Ok(Self(components))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut components = self.0.iter();
        if let Some(first) = components.next() {
            write!(f, "{first}")?;
        }
        for component in components {
            write!(f, ".{component}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal versions must hash equally, so trailing zeros are ignored
        // just as they are in `cmp`.
        let significant = self
            .0
            .iter()
            .rposition(|&component| component != 0)
            .map_or(0, |i| i + 1);
        self.0[..significant].hash(state);
    }
}
