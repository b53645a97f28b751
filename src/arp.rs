use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::Result;

pub const PROC_NET_ARP: &str = "/proc/net/arp";

const INCOMPLETE_MAC: &str = "00:00:00:00:00:00";

/// IPv4 to MAC entries from the kernel neighbour table.
#[derive(Debug, Default, Clone)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, String>,
}

impl ArpTable {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(PROC_NET_ARP))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Parses the `/proc/net/arp` layout. Header, malformed and incomplete
    /// rows are skipped.
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .skip(1)
            .filter_map(|line| {
                let cols: Vec<&str> = line.split_whitespace().collect();
                let ip = cols.first()?.parse::<Ipv4Addr>().ok()?;
                let flags = cols.get(2)?;
                let mac = cols.get(3)?;
                if *flags == "0x0" || *mac == INCOMPLETE_MAC {
                    return None;
                }
                Some((ip, mac.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<&str> {
        self.entries.get(&ip).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         11:22:33:44:55:66     *        eth0
192.168.1.100    0x1         0x2         a0:b1:c2:d3:e4:f5     *        eth0
192.168.1.150    0x1         0x0         00:00:00:00:00:00     *        eth0
garbage line
";

    #[test]
    fn parses_complete_entries() {
        let table = ArpTable::parse(SAMPLE);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.lookup("192.168.1.100".parse().unwrap()),
            Some("a0:b1:c2:d3:e4:f5")
        );
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let table = ArpTable::parse(SAMPLE);
        assert_eq!(table.lookup("192.168.1.150".parse().unwrap()), None);
        assert_eq!(table.lookup("10.0.0.1".parse().unwrap()), None);
    }
}
