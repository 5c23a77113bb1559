//! Per-target identifier sanitization.
//!
//! The rules, per target language:
//! - characters outside the target's identifier set become `_`;
//! - reserved words get an `fsm_` prefix;
//! - empty names become `fsm_unnamed`, leading digits get an `fsm_` prefix;
//! - collisions after sanitization resolve to `_1`, `_2`, ... suffixes,
//!   stable with respect to input order.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    C,
    Python,
    Vhdl,
    Verilog,
    Diagram,
}

static C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "int", "long", "register", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void",
    "volatile", "while",
];

static PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "match", "nonlocal", "not", "or", "pass", "raise", "return",
    "self", "try", "while", "with", "yield",
];

static VHDL_KEYWORDS: &[&str] = &[
    "abs", "access", "after", "alias", "all", "and", "architecture", "array", "assert",
    "attribute", "begin", "block", "body", "buffer", "bus", "case", "component", "configuration",
    "constant", "disconnect", "downto", "else", "elsif", "end", "entity", "exit", "file", "for",
    "function", "generate", "generic", "group", "guarded", "if", "impure", "in", "inertial",
    "inout", "is", "label", "library", "linkage", "literal", "loop", "map", "mod", "nand", "new",
    "next", "nor", "not", "null", "of", "on", "open", "or", "others", "out", "package", "port",
    "postponed", "procedure", "process", "pure", "range", "record", "register", "reject", "rem",
    "report", "return", "rol", "ror", "select", "severity", "signal", "shared", "sla", "sll",
    "sra", "srl", "subtype", "then", "to", "transport", "type", "unaffected", "units", "until",
    "use", "variable", "wait", "when", "while", "with", "xnor", "xor",
];

static VERILOG_KEYWORDS: &[&str] = &[
    "always", "assign", "begin", "case", "casex", "casez", "default", "defparam", "else", "end",
    "endcase", "endfunction", "endmodule", "endtask", "for", "forever", "function", "if",
    "initial", "inout", "input", "integer", "localparam", "module", "negedge", "output",
    "parameter", "posedge", "reg", "repeat", "task", "wire", "while",
];

impl Flavor {
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Flavor::C => C_KEYWORDS,
            Flavor::Python => PYTHON_KEYWORDS,
            Flavor::Vhdl => VHDL_KEYWORDS,
            Flavor::Verilog => VERILOG_KEYWORDS,
            Flavor::Diagram => &[],
        }
    }

    fn keeps(self, c: char) -> bool {
        // Verilog identifiers additionally allow '$'.
        c.is_ascii_alphanumeric() || c == '_' || (self == Flavor::Verilog && c == '$')
    }
}

/// Base sanitization, without collision handling.
pub fn sanitize(name: &str, flavor: Flavor) -> String {
    if name.is_empty() {
        return "fsm_unnamed".to_string();
    }

    let mut s: String = name
        .chars()
        .map(|c| if flavor.keeps(c) { c } else { '_' })
        .collect();

    if flavor == Flavor::Vhdl {
        s = s.to_lowercase();
    }

    if flavor.keywords().contains(&s.as_str()) {
        return format!("fsm_{s}");
    }

    match s.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => s,
        _ => format!("fsm_{s}"),
    }
}

/// Assigns collision-free sanitized names, stable in input order.
#[derive(Debug)]
pub struct NameTable {
    flavor: Flavor,
    assigned: BTreeMap<String, String>,
    taken: BTreeMap<String, usize>,
}

impl NameTable {
    pub fn new(flavor: Flavor) -> Self {
        Self {
            flavor,
            assigned: BTreeMap::new(),
            taken: BTreeMap::new(),
        }
    }

    /// Sanitizes `original`, appending `_1`, `_2`, ... when an earlier
    /// input already claimed the sanitized spelling. Idempotent per input.
    pub fn assign(&mut self, original: &str) -> String {
        if let Some(existing) = self.assigned.get(original) {
            return existing.clone();
        }
        let base = sanitize(original, self.flavor);
        let result = if !self.taken.contains_key(&base) {
            self.taken.insert(base.clone(), 0);
            base
        } else {
            // The suffixed spelling itself may collide with an explicit
            // name; keep counting until a free one turns up, and claim it.
            let mut count = self.taken[&base] + 1;
            let mut candidate = format!("{base}_{count}");
            while self.taken.contains_key(&candidate) {
                count += 1;
                candidate = format!("{base}_{count}");
            }
            self.taken.insert(base.clone(), count);
            self.taken.insert(candidate.clone(), 0);
            candidate
        };
        self.assigned.insert(original.to_string(), result.clone());
        result
    }

    /// The sanitized spelling of a previously assigned name.
    pub fn get(&self, original: &str) -> Option<&str> {
        self.assigned.get(original).map(String::as_str)
    }

    /// Claims a spelling for the generator's own symbols so no assigned
    /// name can shadow it.
    pub fn reserve(&mut self, spelling: &str) {
        self.taken.entry(spelling.to_string()).or_insert(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallowed_characters_become_underscores() {
        assert_eq!(sanitize("Traffic Light!", Flavor::C), "Traffic_Light_");
        assert_eq!(sanitize("Wait 2s", Flavor::Vhdl), "wait_2s");
    }

    #[test]
    fn keywords_get_the_documented_prefix() {
        assert_eq!(sanitize("while", Flavor::C), "fsm_while");
        assert_eq!(sanitize("process", Flavor::Vhdl), "fsm_process");
        assert_eq!(sanitize("lambda", Flavor::Python), "fsm_lambda");
        assert_eq!(sanitize("posedge", Flavor::Verilog), "fsm_posedge");
    }

    #[test]
    fn empty_and_leading_digit_names_are_prefixed() {
        assert_eq!(sanitize("", Flavor::C), "fsm_unnamed");
        assert_eq!(sanitize("2nd", Flavor::C), "fsm_2nd");
    }

    #[test]
    fn verilog_keeps_dollar_signs() {
        assert_eq!(sanitize("tb$probe", Flavor::Verilog), "tb$probe");
        assert_eq!(sanitize("tb$probe", Flavor::C), "tb_probe");
    }

    #[test]
    fn collisions_resolve_stably_in_input_order() {
        let mut table = NameTable::new(Flavor::C);
        assert_eq!(table.assign("go left"), "go_left");
        assert_eq!(table.assign("go-left"), "go_left_1");
        assert_eq!(table.assign("go.left"), "go_left_2");
        // Idempotent per original name.
        assert_eq!(table.assign("go-left"), "go_left_1");
        // An explicit name that collides with a suffixed spelling still
        // maps to something fresh.
        assert_eq!(table.assign("go_left_1"), "go_left_1_1");
    }
}
