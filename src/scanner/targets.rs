use std::{net::Ipv4Addr, str::FromStr, sync::LazyLock};

use crate::error::ScanError;

/// Parse a dotted-quad into its integer form.
pub fn to_integer(dotted_quad: &str) -> Result<u32, ScanError> {
    parse_addr(dotted_quad).map(u32::from)
}

pub fn to_dotted_quad(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

pub fn parse_addr(dotted_quad: &str) -> Result<Ipv4Addr, ScanError> {
    Ipv4Addr::from_str(dotted_quad.trim())
        .map_err(|_| ScanError::InvalidFormat(dotted_quad.to_string()))
}

/// An inclusive range of addresses. `start <= end` is checked by
/// [`Ipv4Range::new`], the fields are public for building ranges that are
/// already known to be valid.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct Ipv4Range {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(addr: Ipv4Addr) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// The range covered by a CIDR block. Host bits in `addr` are ignored.
    pub fn from_cidr(addr: Ipv4Addr, prefix_len: u8) -> Result<Self, ScanError> {
        if prefix_len > 32 {
            return Err(ScanError::InvalidFormat(format!("{addr}/{prefix_len}")));
        }
        // a shift by 32 would overflow, /0 is the whole space
        let host_bits = u32::MAX.checked_shr(u32::from(prefix_len)).unwrap_or(0);
        let addr = u32::from(addr);

        Ok(Self {
            start: Ipv4Addr::from(addr & !host_bits),
            end: Ipv4Addr::from(addr | host_bits),
        })
    }

    pub fn count(&self) -> u64 {
        u64::from(u32::from(self.end)) - u64::from(u32::from(self.start)) + 1
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// Every address in the range, ascending, both ends included.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }

    /// Split the range into contiguous windows of at most `size` addresses.
    /// A `size` of zero is treated as one.
    pub fn windows(&self, size: usize) -> Windows {
        Windows {
            next: Some(u32::from(self.start)),
            end: u32::from(self.end),
            size: u32::try_from(size.max(1)).unwrap_or(u32::MAX),
        }
    }
}

pub struct Windows {
    next: Option<u32>,
    end: u32,
    size: u32,
}

impl Iterator for Windows {
    type Item = Ipv4Range;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next?;
        let end = start.saturating_add(self.size - 1).min(self.end);
        // stop once the end of the range is reached, even if it's 255.255.255.255
        self.next = if end >= self.end { None } else { Some(end + 1) };
        Some(Ipv4Range {
            start: Ipv4Addr::from(start),
            end: Ipv4Addr::from(end),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ipv4Ranges {
    ranges: Vec<Ipv4Range>,
}

impl Ipv4Ranges {
    pub fn new(mut ranges: Vec<Ipv4Range>) -> Self {
        ranges.sort_by_key(|r| r.start);
        Self { ranges }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        // ranges may overlap, so a plain binary search on start isn't enough to
        // rule an address out. walk back from the last range starting at or
        // before addr.
        let candidates = self.ranges.partition_point(|r| r.start <= addr);
        self.ranges[..candidates]
            .iter()
            .rev()
            .any(|range| range.contains(addr))
    }

    /// The number of addresses covered, counting overlaps more than once.
    pub fn count(&self) -> u64 {
        self.ranges.iter().map(Ipv4Range::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &Vec<Ipv4Range> {
        &self.ranges
    }
}

const RESERVED_CIDRS: [(Ipv4Addr, u8); 7] = [
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    // multicast
    (Ipv4Addr::new(224, 0, 0, 0), 4),
    // reserved for future use
    (Ipv4Addr::new(240, 0, 0, 0), 4),
];

static RESERVED_RANGES: LazyLock<Ipv4Ranges> = LazyLock::new(|| {
    Ipv4Ranges::new(
        RESERVED_CIDRS
            .iter()
            .filter_map(|&(addr, prefix_len)| Ipv4Range::from_cidr(addr, prefix_len).ok())
            .collect(),
    )
});

pub fn is_private_or_reserved(addr: Ipv4Addr) -> bool {
    RESERVED_RANGES.contains(addr)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_integer_conversions_are_inverse() {
        for ip in ["0.0.0.0", "1.2.3.4", "5.9.0.1", "128.0.0.1", "255.255.255.255"] {
            assert_eq!(to_dotted_quad(to_integer(ip).unwrap()), ip);
        }
        assert_eq!(to_integer("1.0.0.0").unwrap(), 1 << 24);
        assert_eq!(to_integer("0.0.1.2").unwrap(), 258);
    }

    #[test]
    fn test_invalid_format() {
        for bad in ["", "1.2.3", "1.2.3.4.5", "256.0.0.1", "a.b.c.d", "1.2.3.-4"] {
            assert_eq!(
                to_integer(bad),
                Err(ScanError::InvalidFormat(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_addresses_inclusive_and_ascending() {
        let range = Ipv4Range::new(Ipv4Addr::new(5, 9, 0, 250), Ipv4Addr::new(5, 9, 1, 4)).unwrap();
        let addrs = range.addresses().collect::<Vec<_>>();
        assert_eq!(addrs.len() as u64, range.count());
        assert_eq!(addrs.len(), 11);
        assert_eq!(addrs.first(), Some(&Ipv4Addr::new(5, 9, 0, 250)));
        assert_eq!(addrs.last(), Some(&Ipv4Addr::new(5, 9, 1, 4)));
        assert!(addrs.windows(2).all(|w| w[0] < w[1]));

        // restartable
        assert_eq!(range.addresses().collect::<Vec<_>>(), addrs);
    }

    #[test]
    fn test_start_after_end_rejected() {
        let start = Ipv4Addr::new(5, 9, 0, 2);
        let end = Ipv4Addr::new(5, 9, 0, 1);
        assert_eq!(
            Ipv4Range::new(start, end),
            Err(ScanError::StartAfterEnd { start, end })
        );
    }

    #[test]
    fn test_windows() {
        let range = Ipv4Range::new(Ipv4Addr::new(5, 9, 0, 1), Ipv4Addr::new(5, 9, 0, 60)).unwrap();
        let sizes = range.windows(25).map(|w| w.count()).collect::<Vec<_>>();
        assert_eq!(sizes, vec![25, 25, 10]);

        let windows = range.windows(25).collect::<Vec<_>>();
        assert_eq!(windows[1].start, Ipv4Addr::new(5, 9, 0, 26));
        assert_eq!(windows[2].end, Ipv4Addr::new(5, 9, 0, 60));
    }

    #[test]
    fn test_windows_at_end_of_address_space() {
        let range = Ipv4Range::new(
            Ipv4Addr::new(255, 255, 255, 250),
            Ipv4Addr::new(255, 255, 255, 255),
        )
        .unwrap();
        let windows = range.windows(4).collect::<Vec<_>>();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].end, Ipv4Addr::BROADCAST);

        let single = Ipv4Range::single(Ipv4Addr::BROADCAST);
        assert_eq!(single.windows(25).count(), 1);
        assert_eq!(single.addresses().count(), 1);
    }

    #[test]
    fn test_from_cidr() {
        assert_eq!(
            Ipv4Range::from_cidr(Ipv4Addr::new(172, 20, 1, 1), 12).unwrap(),
            Ipv4Range {
                start: Ipv4Addr::new(172, 16, 0, 0),
                end: Ipv4Addr::new(172, 31, 255, 255),
            }
        );
        assert_eq!(
            Ipv4Range::from_cidr(Ipv4Addr::new(1, 2, 3, 4), 0).unwrap().count(),
            1 << 32
        );
        assert_eq!(
            Ipv4Range::from_cidr(Ipv4Addr::new(1, 2, 3, 4), 32).unwrap(),
            Ipv4Range::single(Ipv4Addr::new(1, 2, 3, 4))
        );
        assert!(Ipv4Range::from_cidr(Ipv4Addr::new(1, 2, 3, 4), 33).is_err());
    }

    #[test]
    fn test_private_or_reserved() {
        for ip in [
            "10.0.0.1",
            "192.168.1.1",
            "127.0.0.1",
            "172.16.0.5",
            "172.31.255.255",
            "0.1.2.3",
            "224.0.0.1",
            "239.255.255.255",
            "255.255.255.255",
        ] {
            assert!(is_private_or_reserved(parse_addr(ip).unwrap()), "{ip}");
        }
        for ip in ["8.8.8.8", "1.1.1.1", "172.15.255.255", "172.32.0.0", "5.9.0.1", "223.255.255.255"] {
            assert!(!is_private_or_reserved(parse_addr(ip).unwrap()), "{ip}");
        }
    }

    #[test]
    fn test_overlapping_ranges_contains() {
        let ranges = Ipv4Ranges::new(vec![
            Ipv4Range::from_cidr(Ipv4Addr::new(1, 0, 0, 0), 8).unwrap(),
            Ipv4Range::single(Ipv4Addr::new(1, 2, 3, 4)),
        ]);
        assert!(ranges.contains(Ipv4Addr::new(1, 200, 0, 0)));
        assert!(ranges.contains(Ipv4Addr::new(1, 2, 3, 4)));
        assert!(!ranges.contains(Ipv4Addr::new(2, 0, 0, 0)));
        assert!(!Ipv4Ranges::default().contains(Ipv4Addr::new(2, 0, 0, 0)));
    }
}
