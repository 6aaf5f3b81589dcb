//! End-to-end test of the dispersal primitives without any networking:
//! encrypt, split the key, persist fragments and the data block, then
//! recover the key from a threshold subset and decrypt.

use dsn::crypto;
use dsn::persistence::{SqliteSink, StorageSink};
use dsn::sss;

#[test]
fn encrypt_split_persist_recover_decrypt_roundtrips() {
    let plaintext = b"overlay node integration payload".to_vec();

    let ciphertext = crypto::encrypt(&plaintext).unwrap();
    let hash = crypto::content_hash(&ciphertext.envelope);

    let fragments = sss::split_key(&ciphertext.key, &hash, 3, 5).unwrap();
    assert_eq!(fragments.len(), 5);

    let sink = SqliteSink::open_in_memory().unwrap();
    for fragment in &fragments {
        sink.store_fragment(fragment).unwrap();
    }
    sink.store_block(&dsn::models::DataBlock {
        hash: hash.clone(),
        cipher: base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            &ciphertext.envelope,
        ),
    })
    .unwrap();

    let stored_fragments = sink.get_fragments(&hash).unwrap();
    assert_eq!(stored_fragments.len(), 5);

    let recovered_key = sss::reconstruct_key(&stored_fragments[1..4]).unwrap();
    assert_eq!(recovered_key, ciphertext.key);

    let stored_block = sink.get_block(&hash).unwrap().expect("block was stored");
    let envelope = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        &stored_block.cipher,
    )
    .unwrap();

    let recovered_plaintext = crypto::decrypt(&recovered_key, &envelope).unwrap();
    assert_eq!(recovered_plaintext, plaintext);
}
