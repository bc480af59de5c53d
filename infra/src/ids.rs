use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use data_encoding::BASE64URL_NOPAD;
use err_derive::Error;
use hex_slice::AsHex;
use rand::distributions::{Distribution, Standard};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub struct Id<T> {
    val: [u8; 16],
    phantom: PhantomData<T>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error(display = "Invalid prefix")]
    InvalidPrefix,
    #[error(display = "Unparseable Id")]
    Unparseable,
}

pub trait Entity {
    const PREFIX: &'static str;
}

/// Hands out fresh random ids.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    _private: (),
}

const DIVIDER: &str = "-";

impl<T> Id<T> {
    /// Derives a stable id from a value, used for well-known documents.
    pub fn hashed<H: Hash + ?Sized>(entity: &H) -> Self {
        let mut val = [0u8; 16];
        for (i, chunk) in val.chunks_mut(8).enumerate() {
            let mut h = siphasher::sip::SipHasher24::new_with_keys(0, i as u64);
            entity.hash(&mut h);
            chunk.copy_from_slice(&h.finish().to_be_bytes());
        }
        Id {
            val,
            phantom: PhantomData,
        }
    }
}

impl IdGen {
    pub fn new() -> Self {
        IdGen::default()
    }

    pub fn generate<T>(&self) -> Id<T> {
        rand::random()
    }
}

impl<T> Distribution<Id<T>> for Standard {
    fn sample<R: ?Sized + rand::Rng>(&self, rng: &mut R) -> Id<T> {
        let val = rng.gen();
        Id {
            val,
            phantom: PhantomData,
        }
    }
}

impl<T: Entity> fmt::Display for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}{}{}",
            T::PREFIX,
            DIVIDER,
            BASE64URL_NOPAD.encode(&self.val)
        )
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Id")
            .field("val", &format_args!("{:x}", self.val.as_hex()))
            .finish()
    }
}

impl<T: Entity> std::str::FromStr for Id<T> {
    type Err = IdParseError;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let remainder = src
            .strip_prefix(T::PREFIX)
            .ok_or(IdParseError::InvalidPrefix)?;
        let b64 = remainder
            .strip_prefix(DIVIDER)
            .ok_or(IdParseError::Unparseable)?;

        let decoded = BASE64URL_NOPAD
            .decode(b64.as_bytes())
            .map_err(|_| IdParseError::Unparseable)?;

        let mut id = Id::default();
        if decoded.len() != id.val.len() {
            return Err(IdParseError::Unparseable);
        }
        id.val.copy_from_slice(&decoded);
        Ok(id)
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        let val = Default::default();
        let phantom = PhantomData;
        Id { val, phantom }
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.hash(state)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.val.cmp(&other.val)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T: Entity> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: Entity> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdStrVisitor<T>(PhantomData<T>);
        impl<'vi, T: Entity> de::Visitor<'vi> for IdStrVisitor<T> {
            type Value = Id<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "an Id string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Id<T>, E> {
                value.parse::<Id<T>>().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(IdStrVisitor(PhantomData))
    }
}
