/// Allocates SSA value names (`%t0, %t1, …`) and block labels (`L0, L1, …`).
///
/// Counters reset at the start of each top-level function body; within a
/// function they only grow, so nested emission contexts (lambdas, generic
/// instantiations triggered mid-expression) can never collide with their
/// surroundings.
#[derive(Debug, Clone, Default)]
pub struct TempAllocator {
    temp_count: usize,
    label_count: usize,
    current_label: String,
}

impl TempAllocator {
    pub fn new() -> Self {
        Self {
            temp_count: 0,
            label_count: 0,
            current_label: "entry".to_owned(),
        }
    }

    pub fn next_temp(&mut self) -> String {
        let name = format!("%t{}", self.temp_count);
        self.temp_count += 1;
        name
    }

    pub fn next_label(&mut self) -> String {
        let name = format!("L{}", self.label_count);
        self.label_count += 1;
        name
    }

    /// The label of the block instructions are currently appended to. Kept up
    /// to date by the emitter whenever it writes a label line; `phi` operands
    /// must name the block their value arrived from.
    pub fn current_label(&self) -> &str {
        &self.current_label
    }

    pub fn set_current_label(&mut self, label: impl ToString) {
        self.current_label = label.to_string();
    }

    pub fn reset(&mut self) {
        self.temp_count = 0;
        self.label_count = 0;
        self.current_label = "entry".to_owned();
    }

    /// Snapshot of the counters, used when a generic instantiation interrupts
    /// the function currently being lowered.
    pub fn save(&self) -> (usize, usize, String) {
        (self.temp_count, self.label_count, self.current_label.clone())
    }

    pub fn restore(&mut self, saved: (usize, usize, String)) {
        self.temp_count = saved.0;
        self.label_count = saved.1;
        self.current_label = saved.2;
    }
}
