//! Shared helpers for the code generator integration tests: assertions over
//! emitted IR text.
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging once for a test binary.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    });
}

/// Expected fragments of an emitted module, in order of appearance.
pub struct ExpectedIr<'a> {
    pub in_order: &'a [&'a str],
}

impl<'a> ExpectedIr<'a> {
    /// Assert that every fragment occurs, in the given order.
    pub fn assert_matches(&self, ir: &str) {
        let mut cursor = 0;
        for fragment in self.in_order {
            match ir[cursor..].find(fragment) {
                Some(offset) => cursor += offset + fragment.len(),
                None => panic!(
                    "expected fragment {fragment:?} (in order) not found in:\n{ir}"
                ),
            }
        }
    }
}

/// Number of non-overlapping occurrences of `needle` in the module.
pub fn count_occurrences(ir: &str, needle: &str) -> usize {
    ir.matches(needle).count()
}

/// Assert that a fragment never occurs.
pub fn assert_absent(ir: &str, needle: &str) {
    assert!(
        !ir.contains(needle),
        "unexpected fragment {needle:?} found in:\n{ir}"
    );
}

/// All `%t<N>` temps assigned in the module, in definition order.
pub fn assigned_temps(ir: &str) -> Vec<String> {
    ir.lines()
        .filter_map(|line| {
            let trimmed = line.trim_start();
            let name = trimmed.split_once(" = ").map(|(name, _)| name)?;
            (name.starts_with("%t")
                && name[2..].chars().all(|c| c.is_ascii_digit()))
            .then(|| name.to_owned())
        })
        .collect()
}
