//! C2PA manifest resolution: store, manifests, claims and assertions.

pub mod assertion;
pub mod claim;
pub mod store;

pub use assertion::{
    BmffHash, BmffMerkleProof, DataHash, DataMatch, ExclusionRange, HardBinding, HashRange,
    MerkleMap, SubsetRange, HARD_BINDING_ASSERTIONS, INGREDIENT_ASSERTION,
};
pub use claim::{Claim, HashedUri};
pub use store::{Manifest, ManifestStore, ManifestType, MANIFEST_STORE_URI};
