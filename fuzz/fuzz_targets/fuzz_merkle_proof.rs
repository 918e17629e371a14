#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keel_merkle::MerkleTree;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    leaves: Vec<[u8; 32]>,
    probe: [u8; 32],
}

fuzz_target!(|data: FuzzInput| {
    let mut leaves = data.leaves;
    leaves.truncate(256);

    let Ok(tree) = MerkleTree::new(leaves.clone()) else {
        assert!(leaves.is_empty());
        return;
    };
    let root = tree.root();

    for leaf in &leaves {
        let proof = tree.proof_for(leaf).unwrap();
        assert!(MerkleTree::verify_proof(leaf, &proof, &root));
    }

    if !leaves.contains(&data.probe) {
        assert!(tree.proof_for(&data.probe).is_err());
    }

    // tampering with any sibling must break verification
    if let Some(leaf) = leaves.first() {
        let mut proof = tree.proof_for(leaf).unwrap();
        if let Some(first) = proof.first_mut() {
            first[0] ^= 1;
            assert!(!MerkleTree::verify_proof(leaf, &proof, &root));
        }
    }
});
