//! Human-readable rendering of [`RenderDetails`].

use std::fmt::Write;

use crate::{InvocationSummary, PatternFeatures, RenderDetails};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.paint(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.paint(s, DIM)
        }
    }
}

/// Format run statistics and, when present, the invocation trace as an
/// indented tree. `color` enables ANSI escapes.
pub fn format_details(details: &RenderDetails, color: bool) -> String {
    let palette = ansi::Palette::new(color);
    let mut out = String::new();

    let _ = writeln!(out, "{}", palette.paint("━━━ Summary ━━━", ansi::GRAY));
    let _ = writeln!(
        out,
        "  Invocations: {}  │  Unmatched: {}  │  Fallbacks: {}  │  Max depth: {}",
        palette.paint(details.invocations.to_string(), ansi::GREEN),
        paint_count(&palette, details.unmatched),
        paint_count(&palette, details.fallbacks),
        palette.paint(details.max_depth.to_string(), ansi::BLUE),
    );

    if !details.trace.is_empty() {
        let _ = writeln!(out, "\n{}", palette.paint("━━━ Trace ━━━", ansi::GRAY));
        for inv in &details.trace {
            let _ = writeln!(out, "{}", fmt_invocation(inv, &palette));
        }
    }

    let _ = writeln!(out, "\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    let _ = writeln!(out, "  Total: {}", palette.paint(format!("{:?}", details.total), ansi::GREEN));
    out
}

fn paint_count(palette: &ansi::Palette, n: usize) -> String {
    if n == 0 { palette.dim("0") } else { palette.paint(n.to_string(), ansi::YELLOW) }
}

fn fmt_invocation(inv: &InvocationSummary, palette: &ansi::Palette) -> String {
    let mode = if inv.mode == inv.rule_mode {
        palette.dim(format!("[{}]", inv.mode))
    } else {
        palette.paint(format!("[{} -> {}]", inv.mode, inv.rule_mode), ansi::YELLOW)
    };
    format!(
        "  {}{} {} {} {} {} {}",
        "  ".repeat(inv.depth),
        palette.bold(palette.paint(&inv.key, ansi::CYAN)),
        palette.paint(&inv.pattern, ansi::BLUE),
        palette.paint(inv.specificity.to_string(), ansi::MAGENTA),
        mode,
        palette.dim(inv.kind.as_str()),
        palette.paint(fmt_features(inv.features), ansi::GRAY),
    )
}

fn fmt_features(features: PatternFeatures) -> String {
    if features.is_empty() {
        return "-".to_string();
    }
    features.iter_names().map(|(name, _)| name).collect::<Vec<_>>().join("|")
}
