/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,  // one-line summary for `avm explain` with no code
    pub long: &'static str,   // full explanation for `avm explain`
}

/// All stable error codes reported by avm.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Loader ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "AVM-L001",
        short: "unexpected character in program image",
        long: r#"## AVM-L001: unexpected character in program image

Program images are flat lists of integer words. Only decimal and `0x`
hexadecimal integers, whitespace, commas and `#` comments may appear.

**Example:**

    10 20 $ 30

Remove the `$`.
"#,
    },
    ErrorEntry {
        code: "AVM-L002",
        short: "word does not fit in 64 bits",
        long: r#"## AVM-L002: word does not fit in 64 bits

Every word is a signed 64-bit integer. Literals must lie between
-9223372036854775808 and 9223372036854775807 (`-0x8000000000000000` and
`0x7fffffffffffffff` in hexadecimal).
"#,
    },
    ErrorEntry {
        code: "AVM-L003",
        short: "program image too large",
        long: r#"## AVM-L003: program image too large

A program image must hold fewer than 2147483647 words so that the image and
its slack can be addressed with 32-bit addresses.
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "AVM-R001",
        short: "allocation failed",
        long: r#"## AVM-R001: allocation failed

The heap, operand stack or call stack could not get more memory, either
because the host refused it or because a configured memory budget was
exhausted. The execution context is unusable afterwards; the run ends.
"#,
    },
    ErrorEntry {
        code: "AVM-R002",
        short: "heap address beyond representable range",
        long: r#"## AVM-R002: heap address beyond representable range

Writing a non-zero value past the materialized heap grows it to the next
power of two above the address. When that size does not fit in a 32-bit
address, or exceeds `heap_limit`, the write is refused.

Writing zero anywhere always succeeds: unwritten memory already reads as zero.
"#,
    },
    ErrorEntry {
        code: "AVM-R003",
        short: "program image exceeds heap limit",
        long: r#"## AVM-R003: program image exceeds heap limit

The loaded image plus `heap_slack` cells is larger than `heap_limit`.
Raise `heap_limit` or lower `heap_slack` in the config file.
"#,
    },
    ErrorEntry {
        code: "AVM-R004",
        short: "operand stack overflow",
        long: r#"## AVM-R004: operand stack overflow

A push would take the operand stack past `stack_limit` values. This usually
means a loop pushes without ever popping.
"#,
    },
    ErrorEntry {
        code: "AVM-R005",
        short: "operand stack underrun",
        long: r#"## AVM-R005: operand stack underrun

A pop or peek was attempted on an empty operand stack. The stack is left
unchanged; the program is malformed or the interpreter has a bug.
"#,
    },
    ErrorEntry {
        code: "AVM-R006",
        short: "call stack full",
        long: r#"## AVM-R006: call stack full

Every reserved call frame is in use. The call stack never grows on its own;
the interpreter must reserve more frames, or `call_stack_capacity` must be
raised.
"#,
    },
    ErrorEntry {
        code: "AVM-R007",
        short: "address range past end of address space",
        long: r#"## AVM-R007: address range past end of address space

A listing was requested for `start + count` cells, which runs beyond the
highest 32-bit address.
"#,
    },
    ErrorEntry {
        code: "AVM-R008",
        short: "context used after allocation failure",
        long: r#"## AVM-R008: context used after allocation failure

After AVM-R001 the execution context only accepts reads and teardown. Any
further mutation reports this error.
"#,
    },

    // ── Config ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "AVM-C001",
        short: "invalid configuration",
        long: r#"## AVM-C001: invalid configuration

The config file could not be read, is not valid JSON, names an unknown
field, or holds inconsistent sizes (zero capacities, a capacity above its
limit, or `heap_slack` above `heap_limit`).
"#,
    },
];

/// Look up an error entry by code (e.g. `"AVM-R005"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmError;

    #[test]
    fn lookup_known_code() {
        let e = lookup("AVM-R005").expect("AVM-R005 should be in registry");
        assert_eq!(e.code, "AVM-R005");
        assert!(e.long.contains("AVM-R005"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup("avm-l001").is_some());
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("AVM-XXXX").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn all_codes_unique() {
        let mut codes: Vec<&str> = REGISTRY.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        let len_before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), len_before, "duplicate codes in registry");
    }

    #[test]
    fn all_codes_have_content() {
        for entry in REGISTRY {
            assert!(!entry.short.is_empty(), "{} missing short description", entry.code);
            assert!(entry.long.contains(entry.code), "{} long text lacks its code", entry.code);
        }
    }

    #[test]
    fn every_runtime_error_is_registered() {
        let errors = [
            VmError::CapacityOverflow { location: 0 },
            VmError::ImageTooLarge { cells: 0, limit: 0 },
            VmError::StackOverflow { limit: 0 },
            VmError::StackUnderrun { action: "pop" },
            VmError::CallStackOverflow { capacity: 0 },
            VmError::AddressRange { start: 0, count: 0 },
            VmError::Unusable,
        ];
        for e in &errors {
            assert!(lookup(e.code()).is_some(), "{} not registered", e.code());
        }
        for kind in [
            crate::loader::LoadErrorKind::UnexpectedCharacter,
            crate::loader::LoadErrorKind::OutOfRange,
            crate::loader::LoadErrorKind::TooLarge,
        ] {
            assert!(lookup(kind.code()).is_some());
        }
    }
}
