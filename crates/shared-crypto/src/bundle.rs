//! # Bundles
//!
//! Building, hashing, signing and attaching bundles.
//!
//! A bundle lists outputs first, then each input as `security` consecutive
//! transactions (the first carries the negative value, the rest are zero and
//! only hold signature fragments). Signing is a pure function of
//! `(seed, key_index, security, bundle_hash)`.

use crate::errors::CryptoError;
use crate::hashing::TryteSponge;
use crate::keys::Seed;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_types::{Address, BundleHash, SecurityLevel, Transaction, TxHash, HASH_TRYTES};

/// Trytes per signature fragment.
pub const SIGNATURE_FRAGMENT_TRYTES: usize = 243;

/// Tag used when none is given.
pub const DEFAULT_TAG: &str = "DONATIONWALLET";

/// An address to credit.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub address: Address,
    pub value: u64,
    pub tag: String,
    pub message: Option<String>,
}

/// An owned address to debit, in full.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub address: Address,
    pub balance: u64,
    pub key_index: u64,
    pub security: SecurityLevel,
}

/// Assembles a signed bundle.
#[derive(Debug, Default)]
pub struct BundleBuilder {
    outputs: Vec<OutputSpec>,
    inputs: Vec<InputSpec>,
    timestamp: u64,
}

impl BundleBuilder {
    /// Start a bundle stamped with `timestamp` (unix seconds).
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn add_output(&mut self, output: OutputSpec) -> &mut Self {
        self.outputs.push(output);
        self
    }

    pub fn add_input(&mut self, input: InputSpec) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Lay out, hash and sign the bundle.
    ///
    /// # Errors
    ///
    /// `EmptyBundle` with no outputs, `MalformedBundle` when inputs and
    /// outputs do not balance.
    pub fn build(&self, seed: &Seed) -> Result<Vec<Transaction>, CryptoError> {
        let (mut txs, input_slots) = self.layout()?;
        let bundle = txs[0].bundle.clone();
        for (slot, input) in input_slots.into_iter().zip(&self.inputs) {
            let fragments = sign(seed, input.key_index, input.security, &bundle)?;
            for (offset, fragment) in fragments.into_iter().enumerate() {
                txs[slot + offset].signature_fragment = fragment;
            }
        }
        Ok(txs)
    }

    /// Lay out and hash a zero-value bundle, which needs no signature.
    pub fn build_unsigned(&self) -> Result<Vec<Transaction>, CryptoError> {
        if !self.inputs.is_empty() {
            return Err(CryptoError::MalformedBundle(
                "bundle with inputs must be signed".into(),
            ));
        }
        self.layout().map(|(txs, _)| txs)
    }

    /// Transactions with indices and bundle hash set, plus the index of the
    /// first transaction of every input.
    fn layout(&self) -> Result<(Vec<Transaction>, Vec<usize>), CryptoError> {
        if self.outputs.is_empty() {
            return Err(CryptoError::EmptyBundle);
        }
        let debit: u64 = self.inputs.iter().map(|i| i.balance).sum();
        let credit: u64 = self.outputs.iter().map(|o| o.value).sum();
        if !self.inputs.is_empty() && debit != credit {
            return Err(CryptoError::MalformedBundle(format!(
                "inputs {debit} != outputs {credit}"
            )));
        }
        if self.inputs.is_empty() && credit != 0 {
            return Err(CryptoError::MalformedBundle(
                "value-bearing bundle without inputs".into(),
            ));
        }

        let mut txs = Vec::new();
        for output in &self.outputs {
            txs.push(self.blank(
                output.address.clone(),
                output.value as i64,
                &output.tag,
                output.message.clone(),
            ));
        }
        let mut input_slots = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            input_slots.push(txs.len());
            for fragment in 0..input.security.fragments() {
                let value = if fragment == 0 {
                    -(input.balance as i64)
                } else {
                    0
                };
                txs.push(self.blank(input.address.clone(), value, DEFAULT_TAG, None));
            }
        }

        let last_index = (txs.len() - 1) as u64;
        for (i, tx) in txs.iter_mut().enumerate() {
            tx.current_index = i as u64;
            tx.last_index = last_index;
        }

        let bundle = bundle_hash(&txs)?;
        for tx in txs.iter_mut() {
            tx.bundle = bundle.clone();
        }
        Ok((txs, input_slots))
    }

    fn blank(&self, address: Address, value: i64, tag: &str, message: Option<String>) -> Transaction {
        Transaction {
            hash: TxHash::null(),
            address,
            value,
            bundle: BundleHash::null(),
            current_index: 0,
            last_index: 0,
            timestamp: self.timestamp,
            trunk: TxHash::null(),
            branch: TxHash::null(),
            tag: tag.to_string(),
            signature_fragment: String::new(),
            message,
        }
    }
}

fn check_indices(txs: &[Transaction]) -> Result<(), CryptoError> {
    if txs.is_empty() {
        return Err(CryptoError::EmptyBundle);
    }
    let last = (txs.len() - 1) as u64;
    for (i, tx) in txs.iter().enumerate() {
        if tx.current_index != i as u64 || tx.last_index != last {
            return Err(CryptoError::MalformedBundle(format!(
                "transaction {i} has index {}/{}",
                tx.current_index, tx.last_index
            )));
        }
    }
    Ok(())
}

/// Hash the essence (address, value, tag, timestamp, indices) of a bundle.
pub fn bundle_hash(txs: &[Transaction]) -> Result<BundleHash, CryptoError> {
    check_indices(txs)?;
    let mut sponge = TryteSponge::with_domain("dw/bundle");
    for tx in txs {
        sponge
            .absorb(tx.address.as_str().as_bytes())
            .absorb(&tx.value.to_le_bytes())
            .absorb_field(tx.tag.as_bytes())
            .absorb(&tx.timestamp.to_le_bytes())
            .absorb(&tx.current_index.to_le_bytes())
            .absorb(&tx.last_index.to_le_bytes());
    }
    Ok(BundleHash::from_trusted(sponge.squeeze_trytes(HASH_TRYTES)))
}

/// Signature fragments for the key at `key_index` over `bundle`.
pub fn sign(
    seed: &Seed,
    key_index: u64,
    security: SecurityLevel,
    bundle: &BundleHash,
) -> Result<Vec<String>, CryptoError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(seed.expose())
        .map_err(|e| CryptoError::InvalidSeed(e.to_string()))?;
    mac.update(&key_index.to_le_bytes());
    mac.update(&[security.as_u8()]);
    let private_key = mac.finalize().into_bytes();

    Ok((0..security.fragments())
        .map(|fragment| {
            let mut sponge = TryteSponge::with_domain("dw/signature");
            sponge
                .absorb(&private_key)
                .absorb(&(fragment as u64).to_le_bytes())
                .absorb(bundle.as_str().as_bytes());
            sponge.squeeze_trytes(SIGNATURE_FRAGMENT_TRYTES)
        })
        .collect())
}

/// Hash of an attached transaction.
pub fn transaction_hash(tx: &Transaction, nonce: u64) -> TxHash {
    let mut sponge = TryteSponge::with_domain("dw/transaction");
    sponge
        .absorb(tx.bundle.as_str().as_bytes())
        .absorb(tx.address.as_str().as_bytes())
        .absorb(&tx.value.to_le_bytes())
        .absorb(&tx.current_index.to_le_bytes())
        .absorb(&tx.timestamp.to_le_bytes())
        .absorb(tx.trunk.as_str().as_bytes())
        .absorb(tx.branch.as_str().as_bytes())
        .absorb_field(tx.signature_fragment.as_bytes())
        .absorb_field(tx.message.as_deref().unwrap_or_default().as_bytes())
        .absorb(&nonce.to_le_bytes());
    TxHash::from_trusted(sponge.squeeze_trytes(HASH_TRYTES))
}

/// Chain a bundle onto `(trunk, branch)` and compute transaction hashes.
///
/// The last transaction approves `(trunk, branch)`; every other one approves
/// its successor and `trunk`. `mwm` is folded into the hash as the nonce
/// instead of searched for; real work is left to the node.
pub fn attach(
    trunk: &TxHash,
    branch: &TxHash,
    mwm: u64,
    txs: &[Transaction],
) -> Result<Vec<Transaction>, CryptoError> {
    check_indices(txs)?;
    let mut attached = txs.to_vec();
    let mut successor: Option<TxHash> = None;
    for tx in attached.iter_mut().rev() {
        match successor.take() {
            None => {
                tx.trunk = trunk.clone();
                tx.branch = branch.clone();
            }
            Some(next) => {
                tx.trunk = next;
                tx.branch = trunk.clone();
            }
        }
        tx.hash = transaction_hash(tx, mwm);
        successor = Some(tx.hash.clone());
    }
    Ok(attached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::derive_address;

    fn seed() -> Seed {
        Seed::new("TESTSEED").unwrap()
    }

    fn output(value: u64) -> OutputSpec {
        OutputSpec {
            address: Address::new("B".repeat(81)).unwrap(),
            value,
            tag: DEFAULT_TAG.into(),
            message: None,
        }
    }

    #[test]
    fn test_value_bundle_layout() {
        let seed = seed();
        let security = SecurityLevel::DEFAULT;
        let mut builder = BundleBuilder::new(1_700_000_000);
        builder.add_output(output(30)).add_output(output(70)).add_input(InputSpec {
            address: derive_address(&seed, 3, security),
            balance: 100,
            key_index: 3,
            security,
        });
        let txs = builder.build(&seed).unwrap();

        assert_eq!(txs.len(), 2 + security.fragments());
        assert_eq!(txs.iter().map(|t| t.value).sum::<i64>(), 0);
        assert!(txs.iter().all(|t| t.bundle == txs[0].bundle));
        assert!(txs[2..].iter().all(|t| t.signature_fragment.len() == SIGNATURE_FRAGMENT_TRYTES));
        assert_eq!(bundle_hash(&txs).unwrap(), txs[0].bundle);
    }

    #[test]
    fn test_unbalanced_bundle_rejected() {
        let seed = seed();
        let mut builder = BundleBuilder::new(0);
        builder.add_output(output(101)).add_input(InputSpec {
            address: derive_address(&seed, 0, SecurityLevel::DEFAULT),
            balance: 100,
            key_index: 0,
            security: SecurityLevel::DEFAULT,
        });
        assert!(matches!(builder.build(&seed), Err(CryptoError::MalformedBundle(_))));
        assert_eq!(BundleBuilder::new(0).build(&seed), Err(CryptoError::EmptyBundle));
    }

    #[test]
    fn test_unsigned_build_only_for_zero_value() {
        let mut builder = BundleBuilder::new(0);
        builder.add_output(output(0));
        let txs = builder.build_unsigned().unwrap();
        assert_eq!(txs.len(), 1);
        assert!(txs[0].signature_fragment.is_empty());

        builder.add_input(InputSpec {
            address: derive_address(&seed(), 0, SecurityLevel::DEFAULT),
            balance: 0,
            key_index: 0,
            security: SecurityLevel::DEFAULT,
        });
        assert!(builder.build_unsigned().is_err());
    }

    #[test]
    fn test_signing_is_pure() {
        let bundle = BundleHash::new("C".repeat(81)).unwrap();
        let a = sign(&seed(), 1, SecurityLevel::DEFAULT, &bundle).unwrap();
        let b = sign(&seed(), 1, SecurityLevel::DEFAULT, &bundle).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sign(&seed(), 2, SecurityLevel::DEFAULT, &bundle).unwrap());
    }

    #[test]
    fn test_attach_chains_transactions() {
        let mut builder = BundleBuilder::new(0);
        builder.add_output(output(0)).add_output(output(0));
        let txs = builder.build(&seed()).unwrap();
        let trunk = TxHash::new("T".repeat(81)).unwrap();
        let branch = TxHash::new("R".repeat(81)).unwrap();

        let attached = attach(&trunk, &branch, 14, &txs).unwrap();
        assert_eq!(attached[1].trunk, trunk);
        assert_eq!(attached[1].branch, branch);
        assert_eq!(attached[0].trunk, attached[1].hash);
        assert_eq!(attached[0].branch, trunk);

        // Fresh tips give a fresh tail hash for the same signed content.
        let other = TxHash::new("S".repeat(81)).unwrap();
        let reattached = attach(&other, &branch, 14, &txs).unwrap();
        assert_ne!(reattached[0].hash, attached[0].hash);
        assert_eq!(reattached[0].bundle, attached[0].bundle);
    }
}
