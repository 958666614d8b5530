use criterion::{Criterion, black_box, criterion_group, criterion_main};
use voicewire::crypto::{self, EncryptMode};
use voicewire::net::udp::packet::{MEDIA_HEADER_LEN, build_media_header};
use voicewire_types::SECRET_KEY_LEN;

const SECRET_KEY: &str = "fb5e9f96f291742023f321c7f4f967a2d90f4e7dadb2d9bd66774ad3ebb3ac5d";

// Largest Opus packet and a typical 20 ms voice frame.
const PAYLOAD_SIZES: &[usize] = &[1275, 160];

fn media_packets(c: &mut Criterion) {
    let key: [u8; SECRET_KEY_LEN] = hex::decode(SECRET_KEY)
        .expect("valid hex encoded bytes")
        .try_into()
        .expect("valid secret key");

    for mode in EncryptMode::ALL.iter().copied().filter(|mode| mode.is_available()) {
        let aead = crypto::aead(mode, &key).expect("mode is available");

        let header = build_media_header(41, 960 * 41, 1234);
        let mut nonce = vec![0u8; mode.nonce_size()];
        nonce[..MEDIA_HEADER_LEN].copy_from_slice(&header);

        for size in PAYLOAD_SIZES {
            let payload = vec![0x5a; *size];

            #[allow(clippy::unwrap_used)]
            c.bench_function(
                &format!("seal {} (p: {size} bytes)", mode.to_request_str()),
                |b| {
                    b.iter(|| {
                        let sealed = aead.encrypt(&nonce, &[], black_box(&payload)).unwrap();
                        let mut packet = Vec::with_capacity(MEDIA_HEADER_LEN + sealed.len());
                        packet.extend_from_slice(&header);
                        packet.extend_from_slice(&sealed);
                        black_box(packet)
                    });
                },
            );

            let sealed = aead
                .encrypt(&nonce, &[], &payload)
                .expect("should encrypt payload");

            #[allow(clippy::unwrap_used)]
            c.bench_function(
                &format!("open {} (p: {size} bytes)", mode.to_request_str()),
                |b| {
                    b.iter(|| black_box(aead.decrypt(&nonce, &[], black_box(&sealed)).unwrap()));
                },
            );
        }
    }
}

criterion_group!(benches, media_packets);
criterion_main!(benches);
