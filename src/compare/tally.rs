/// Per-region mutation counters of one read comparison
use crate::read::Region;

/// How a discrepancy between the two reads was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// The second read introduced a mutation that keeps the amino acid
    AddedSilent,
    /// The second read introduced a mutation that changes the amino acid
    AddedNonsilent,
    /// The first read's mutation is gone in the second read, same amino acid
    CanceledSilent,
    /// Both reads differ from the germline and from each other
    ExchangedNonsilent,
    /// The first read's mutation is gone in the second read
    CanceledNonsilent,
}

impl Bucket {
    /// Summary order.
    pub const ALL: [Bucket; 5] = [
        Bucket::AddedSilent,
        Bucket::AddedNonsilent,
        Bucket::CanceledSilent,
        Bucket::ExchangedNonsilent,
        Bucket::CanceledNonsilent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::AddedSilent => "sSHM+",
            Self::AddedNonsilent => "nsSHM+",
            Self::CanceledSilent => "sSHM-",
            Self::ExchangedNonsilent => "nsSHMchg",
            Self::CanceledNonsilent => "nsSHM-",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::AddedSilent => 0,
            Self::AddedNonsilent => 1,
            Self::CanceledSilent => 2,
            Self::ExchangedNonsilent => 3,
            Self::CanceledNonsilent => 4,
        }
    }
}

/// Counts per region, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionCounts {
    entries: Vec<(Region, u32)>,
}

impl RegionCounts {
    pub fn add(&mut self, region: Region) {
        match self.entries.iter_mut().find(|(r, _)| *r == region) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((region, 1)),
        }
    }

    pub fn get(&self, region: Region) -> u32 {
        self.entries
            .iter()
            .find(|(r, _)| *r == region)
            .map_or(0, |(_, count)| *count)
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, u32)> + '_ {
        self.entries.iter().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationTally {
    buckets: [RegionCounts; 5],
    /// First-read mutations inside the 5' primer window that the second read
    /// does not carry
    pub fr1_primer_canceled: u32,
    /// Same, inside the 3' (J) primer window
    pub j_primer_canceled: u32,
    /// Second-read mutations inside the 3' (J) primer window
    pub j_primer_added: u32,
}

impl MutationTally {
    pub fn add(&mut self, bucket: Bucket, region: Region) {
        self.buckets[bucket.index()].add(region);
    }

    pub fn bucket(&self, bucket: Bucket) -> &RegionCounts {
        &self.buckets[bucket.index()]
    }

    pub fn count(&self, bucket: Bucket, region: Region) -> u32 {
        self.bucket(bucket).get(region)
    }

    /// Nonsilent changes introduced by the second read.
    pub fn total_nonsilent(&self) -> u32 {
        self.bucket(Bucket::AddedNonsilent).total() + self.bucket(Bucket::ExchangedNonsilent).total()
    }

    pub fn is_empty(&self) -> bool {
        self.fr1_primer_canceled == 0
            && self.j_primer_canceled == 0
            && self.j_primer_added == 0
            && self.buckets.iter().all(|b| b.total() == 0)
    }

    /// Non-zero counters as summary items, in fixed order.
    pub fn summary_items(&self) -> Vec<String> {
        let mut items = Vec::new();
        if self.fr1_primer_canceled > 0 {
            items.push(format!("{} SHM- FR1(P)", self.fr1_primer_canceled));
        }
        for bucket in Bucket::ALL {
            for (region, count) in self.bucket(bucket).iter() {
                items.push(format!("{} {} {}", count, bucket.label(), region));
            }
        }
        if self.j_primer_canceled > 0 {
            items.push(format!("{} SHM J(P)-", self.j_primer_canceled));
        }
        if self.j_primer_added > 0 {
            items.push(format!("{} SHM J(P)+", self.j_primer_added));
        }
        items
    }
}
