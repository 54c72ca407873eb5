use permitwalk_core::config::SiteConfig;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of `IW_AjaxID` correlation tokens.
///
/// A token is a fixed decimal prefix followed by a fixed number of decimal
/// digits. The server does not check the digits, only the shape.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub struct RandomIdGenerator {
    prefix: String,
    digits: usize,
}

impl RandomIdGenerator {
    pub fn new(prefix: impl Into<String>, digits: usize) -> Self {
        Self {
            prefix: prefix.into(),
            digits,
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(site.ajax_id_prefix.clone(), site.ajax_id_digits)
    }
}

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> String {
        let mut rng = rand::thread_rng();
        let mut id = String::with_capacity(self.prefix.len() + self.digits);
        id.push_str(&self.prefix);
        for _ in 0..self.digits {
            id.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }
        id
    }
}

/// Deterministic tokens: prefix + zero-padded counter, wrapping at the digit width.
pub struct SequenceIdGenerator {
    prefix: String,
    digits: usize,
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new(prefix: impl Into<String>, digits: usize) -> Self {
        Self {
            prefix: prefix.into(),
            digits,
            counter: AtomicU64::new(0),
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(site.ajax_id_prefix.clone(), site.ajax_id_digits)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let n = match 10u64.checked_pow(self.digits as u32) {
            Some(modulus) => n % modulus,
            None => n,
        };
        format!("{}{:0width$}", self.prefix, n, width = self.digits)
    }
}
