//! Per-session random streams derived from a single replayable seed.
use crate::constants::{RNG_DOMAIN_BONUS, RNG_DOMAIN_ITEM, RNG_DOMAIN_RARITY};
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Deterministic bundle of RNG streams segregated by draw concern.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    rarity: CountingRng<SmallRng>,
    item: CountingRng<SmallRng>,
    bonus: CountingRng<SmallRng>,
}

impl RngBundle {
    /// Construct the bundle from a session seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rarity: CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_RARITY)),
            item: CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_ITEM)),
            bonus: CountingRng::new(derive_stream_seed(seed, RNG_DOMAIN_BONUS)),
        }
    }

    /// Construct the bundle from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub const fn rarity(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.rarity
    }

    pub const fn item(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.item
    }

    pub const fn bonus(&mut self) -> &mut CountingRng<SmallRng> {
        &mut self.bonus
    }

    #[must_use]
    pub const fn usage(&self) -> RngUsage {
        RngUsage {
            rarity: self.rarity.draws(),
            item: self.item.draws(),
            bonus: self.bonus.draws(),
        }
    }
}

/// Draw counts per stream, kept with the history record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngUsage {
    pub rarity: u64,
    pub item: u64,
    pub bonus: u64,
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&seed.to_le_bytes()).expect("HMAC accepts any key length");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}
