use std::{fs, net::Ipv4Addr, path::Path, str::FromStr};

use eyre::eyre;

use crate::scanner::targets::{Ipv4Range, Ipv4Ranges};

pub fn parse_file(path: impl AsRef<Path>) -> eyre::Result<Ipv4Ranges> {
    let input = fs::read_to_string(path)?;

    parse(&input)
}

pub fn parse(input: &str) -> eyre::Result<Ipv4Ranges> {
    let mut ranges = Vec::new();

    for line in input.lines() {
        // remove everything after the first #
        let line = line.split('#').next().unwrap_or_default().trim();

        if line.is_empty() {
            continue;
        }

        // can be either like 0.0.0.0-0.0.0.0 or 0.0.0.0/32
        let range = match (line.split_once('/'), line.split_once('-')) {
            (Some(_), Some(_)) => {
                return Err(eyre!(
                    "Invalid exclude range: {line} (cannot contain both - and /)"
                ));
            }
            (Some((ip, prefix_len)), None) => {
                let prefix_len = prefix_len.trim().parse::<u8>()?;
                Ipv4Range::from_cidr(Ipv4Addr::from_str(ip.trim())?, prefix_len)?
            }
            (None, Some((start, end))) => {
                let start = Ipv4Addr::from_str(start.trim())?;
                let end = Ipv4Addr::from_str(end.trim())?;

                Ipv4Range::new(start, end).map_err(|_| {
                    eyre!("Invalid exclude range: {line} (start cannot be greater than end)")
                })?
            }
            (None, None) => Ipv4Range::single(Ipv4Addr::from_str(line)?),
        };

        ranges.push(range);
    }

    Ok(Ipv4Ranges::new(ranges))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_all_forms() {
        let ranges = parse(
            "
            # comment
            1.2.3.0/24
            5.9.0.10-5.9.0.20 # trailing comment

            8.8.8.8
            ",
        )
        .unwrap();

        assert_eq!(ranges.ranges().len(), 3);
        assert!(ranges.contains(Ipv4Addr::new(1, 2, 3, 255)));
        assert!(ranges.contains(Ipv4Addr::new(5, 9, 0, 15)));
        assert!(!ranges.contains(Ipv4Addr::new(5, 9, 0, 21)));
        assert!(ranges.contains(Ipv4Addr::new(8, 8, 8, 8)));
        assert_eq!(ranges.count(), 256 + 11 + 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("1.2.3.4/24-1.2.3.5").is_err());
        assert!(parse("5.9.0.20-5.9.0.10").is_err());
        assert!(parse("1.2.3.4/40").is_err());
        assert!(parse("not an ip").is_err());
    }
}
