//! JPEG2000 encoder option sets.
//!
//! Options are an ordered list of named arguments. Layering a later value for
//! the same name replaces the earlier one in place, so the resolved order is
//! stable: hard-coded defaults, then the lossless/lossy preset, then caller
//! overrides.

use std::fmt;

/// Switch that marks the last channel as alpha in the JP2 header.
pub const ALPHA_SWITCH: &str = "-jp2_alpha";
const RATE_SWITCH: &str = "-rate";
const REVERSIBLE_PARAM: &str = "Creversible";

/// One encoder argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KakaduArg {
    /// Codestream or file-format parameter, rendered as `Key=value`
    Param { key: String, value: String },
    /// Command-line switch, optionally followed by a separate value
    Switch { name: String, value: Option<String> },
}

impl KakaduArg {
    pub fn param(key: impl Into<String>, value: impl Into<String>) -> Self {
        KakaduArg::Param {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn switch(name: impl Into<String>, value: Option<&str>) -> Self {
        KakaduArg::Switch {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            KakaduArg::Param { key, .. } => key,
            KakaduArg::Switch { name, .. } => name,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            KakaduArg::Param { value, .. } => Some(value),
            KakaduArg::Switch { value, .. } => value.as_deref(),
        }
    }

    fn push_args(&self, out: &mut Vec<String>) {
        match self {
            KakaduArg::Param { key, value } => out.push(format!("{key}={value}")),
            KakaduArg::Switch { name, value } => {
                out.push(name.clone());
                if let Some(value) = value {
                    out.push(value.clone());
                }
            }
        }
    }
}

/// Immutable set of JPEG2000 compression options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionOptions {
    args: Vec<KakaduArg>,
}

impl ConversionOptions {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Tiling, precinct, code-block and progression geometry, with neither a
    /// lossless nor a lossy rate chosen.
    pub fn defaults() -> Self {
        Self::empty()
            .with_param("Clevels", "6")
            .with_param("Clayers", "6")
            .with_param("Cprecincts", "{256,256},{256,256},{128,128}")
            .with_param("Stiles", "{512,512}")
            .with_param("Corder", "RPCL")
            .with_param("ORGgen_plt", "yes")
            .with_param("ORGtparts", "R")
            .with_param("Cblk", "{64,64}")
            .with_param("Cuse_sop", "yes")
            .with_param("Cuse_eph", "yes")
            .with_switch("-flush_period", Some("1024"))
    }

    pub fn lossless_preset() -> Self {
        Self::empty()
            .with_param(REVERSIBLE_PARAM, "yes")
            .with_switch(RATE_SWITCH, Some("-"))
    }

    pub fn lossy_preset() -> Self {
        Self::empty().with_switch(RATE_SWITCH, Some("3"))
    }

    pub fn lossless() -> Self {
        Self::defaults().layered(&Self::lossless_preset())
    }

    pub fn lossy() -> Self {
        Self::defaults().layered(&Self::lossy_preset())
    }

    pub fn with(mut self, arg: KakaduArg) -> Self {
        match self.args.iter_mut().find(|existing| existing.name() == arg.name()) {
            Some(existing) => *existing = arg,
            None => self.args.push(arg),
        }
        self
    }

    pub fn with_param(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(KakaduArg::param(key, value))
    }

    pub fn with_switch(self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.with(KakaduArg::switch(name, value))
    }

    /// Applies every argument of `overrides` on top of this set.
    pub fn layered(self, overrides: &ConversionOptions) -> Self {
        overrides.args.iter().cloned().fold(self, Self::with)
    }

    pub fn with_alpha(self) -> Self {
        self.with_switch(ALPHA_SWITCH, None)
    }

    pub fn get(&self, name: &str) -> Option<&KakaduArg> {
        self.args.iter().find(|arg| arg.name() == name)
    }

    pub fn has_alpha(&self) -> bool {
        self.get(ALPHA_SWITCH).is_some()
    }

    /// Reversible wavelet with no rate limit.
    pub fn is_lossless(&self) -> bool {
        let reversible = self.get(REVERSIBLE_PARAM).and_then(KakaduArg::value) == Some("yes");
        let unlimited = self.get(RATE_SWITCH).and_then(KakaduArg::value) == Some("-");
        reversible && unlimited
    }

    pub fn args(&self) -> &[KakaduArg] {
        &self.args
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() * 2);
        for arg in &self.args {
            arg.push_args(&mut out);
        }
        out
    }
}

impl fmt::Display for ConversionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}
