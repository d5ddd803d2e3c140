use std::fmt;

use crate::vm::{ADDR_MAX, Addr, Context, VmError, VmResult, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Values only, space separated, on one line.
    Dense,
    /// One `ADDRESS: value` line per cell, instruction pointer marked.
    Expanded,
}

const INS_MARKER: &str = "  <- ins";

/// Heap cells `[start, start + count)`, formatted lazily by [`fmt::Display`].
/// Cells past the materialized heap read as zero like any other heap read.
/// The range is never buffered.
pub struct Listing<'a> {
    ctx: &'a Context,
    start: u64,
    end: u64,
    mode: ListMode,
}

impl<'a> Listing<'a> {
    pub fn new(ctx: &'a Context, start: Addr, count: Addr, mode: ListMode) -> VmResult<Self> {
        let end = u64::from(start) + u64::from(count);
        if end > u64::from(ADDR_MAX) + 1 {
            return Err(VmError::AddressRange { start, count });
        }
        Ok(Listing { ctx, start: u64::from(start), end, mode })
    }

    fn values(&self) -> impl Iterator<Item = (Addr, Word)> + '_ {
        (self.start..self.end).map(|a| {
            let addr = a as Addr;
            (addr, self.ctx.heap_get(addr))
        })
    }
}

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ListMode::Dense => {
                for (addr, value) in self.values() {
                    if u64::from(addr) != self.start {
                        f.write_str(" ")?;
                    }
                    write!(f, "{value}")?;
                }
            }
            ListMode::Expanded => {
                let width = self.values().map(|(_, v)| digits(v)).max().unwrap_or(1);
                for (addr, value) in self.values() {
                    write!(f, "{addr:08x}: {value:>width$}")?;
                    if addr == self.ctx.ins {
                        f.write_str(INS_MARKER)?;
                    }
                    f.write_str("\n")?;
                }
            }
        }
        Ok(())
    }
}

/// Printed width of `value`, sign included.
fn digits(value: Word) -> usize {
    let sign = usize::from(value < 0);
    let mut n = value.unsigned_abs();
    let mut len = 1;
    while n >= 10 {
        n /= 10;
        len += 1;
    }
    sign + len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn ctx(program: &[i64]) -> Context {
        let cfg = Config { heap_slack: 4, stack_capacity: 4, call_stack_capacity: 4, ..Config::default() };
        Context::new(program, &cfg).unwrap()
    }

    fn render(ctx: &Context, start: Addr, count: Addr, mode: ListMode) -> VmResult<String> {
        Ok(Listing::new(ctx, start, count, mode)?.to_string())
    }

    #[test]
    fn dense_listing() {
        let c = ctx(&[10, -20, 30]);
        assert_eq!(render(&c, 0, 4, ListMode::Dense).unwrap(), "10 -20 30 0");
    }

    #[test]
    fn expanded_listing_marks_ins() {
        let mut c = ctx(&[10, -20, 30]);
        c.ins = 1;
        let out = render(&c, 0, 3, ListMode::Expanded).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec![
            "00000000:  10",
            "00000001: -20  <- ins",
            "00000002:  30",
        ]);
    }

    #[test]
    fn listing_past_materialized_heap_reads_zero() {
        let c = ctx(&[1]);
        let out = render(&c, 1_000_000, 2, ListMode::Dense).unwrap();
        assert_eq!(out, "0 0");
    }

    #[test]
    fn empty_range() {
        let c = ctx(&[1]);
        assert_eq!(render(&c, 0, 0, ListMode::Dense).unwrap(), "");
        assert_eq!(render(&c, 0, 0, ListMode::Expanded).unwrap(), "");
    }

    #[test]
    fn range_touching_top_of_address_space() {
        let c = ctx(&[]);
        let out = render(&c, ADDR_MAX, 1, ListMode::Expanded).unwrap();
        assert_eq!(out, "ffffffff: 0\n");
    }

    #[test]
    fn digits_match_display() {
        for v in [0, 7, -7, 10, -10, 99, 12345, i64::MAX, i64::MIN] {
            assert_eq!(digits(v), v.to_string().len(), "{v}");
        }
    }

    /// Counts bytes instead of keeping them.
    struct Tally(usize);

    impl fmt::Write for Tally {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    #[test]
    fn large_listing_streams_without_buffering() {
        use std::fmt::Write as _;

        let c = ctx(&[1]);
        let count: Addr = 1 << 22;
        let listing = Listing::new(&c, 0, count, ListMode::Dense).unwrap();
        let mut tally = Tally(0);
        write!(tally, "{listing}").unwrap();
        // "1" then " 0" for every other cell
        assert_eq!(tally.0, 1 + 2 * (count as usize - 1));

        let listing = Listing::new(&c, 0, count, ListMode::Expanded).unwrap();
        let mut tally = Tally(0);
        write!(tally, "{listing}").unwrap();
        // "00000000: 1  <- ins\n" then "xxxxxxxx: 0\n"
        assert_eq!(tally.0, 20 + 12 * (count as usize - 1));
    }

    #[test]
    fn range_wrapping_address_space_fails() {
        let c = ctx(&[]);
        let err = render(&c, ADDR_MAX, 2, ListMode::Dense).unwrap_err();
        assert!(matches!(err, VmError::AddressRange { start: ADDR_MAX, count: 2 }));
        assert!(Listing::new(&c, 1, ADDR_MAX, ListMode::Dense).is_err());
    }
}
