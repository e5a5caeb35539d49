//! Entry exclusion by basename.

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumPatternMode, ValidationError};

#[derive(Debug, Clone)]
pub(crate) enum TypeMirrorPatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

/// Compiled exclusion patterns. Empty input compiles to "exclude nothing".
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecMirrorPatterns {
    pub(crate) patterns_exclude: Option<TypeMirrorPatternSeq>,
}

impl SpecMirrorPatterns {
    pub(crate) fn from_raw(
        patterns_exclude: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            patterns_exclude: compile(patterns_exclude, rule_pattern)?,
        })
    }

    /// Whether an entry with basename `name` is excluded.
    ///
    /// Literal patterns match as substrings; glob and regex as written.
    pub(crate) fn is_excluded(&self, name: &str) -> bool {
        match &self.patterns_exclude {
            None => false,
            Some(TypeMirrorPatternSeq::Literal(v)) => v.iter().any(|p| name.contains(p.as_str())),
            Some(TypeMirrorPatternSeq::Glob(v)) => v.iter().any(|p| p.is_match(name)),
            Some(TypeMirrorPatternSeq::Regex(v)) => v.iter().any(|p| p.is_match(name)),
        }
    }
}

fn compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumPatternMode,
) -> Result<Option<TypeMirrorPatternSeq>, ValidationError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumPatternMode::Literal => Ok(Some(TypeMirrorPatternSeq::Literal(patterns.to_vec()))),
        EnumPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| ValidationError::InvalidPattern(e.to_string()))?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeMirrorPatternSeq::Glob(l_glob)))
        }
        EnumPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex =
                    Regex::new(pattern).map_err(|e| ValidationError::InvalidPattern(e.to_string()))?;
                l_regex.push(regex);
            }
            Ok(Some(TypeMirrorPatternSeq::Regex(l_regex)))
        }
    }
}
