use criterion::{black_box, criterion_group, criterion_main, Criterion};
use notary_mpc::{
    config::ParameterConfig,
    keygen,
    paillier::DecryptionKey,
    params::ProtocolParameters,
    protocol::{run_protocol, Participant, Protocol},
    session::SessionId,
    sign, AggregateKey, FullSignature, KeygenOutput, SigningRequest,
};
use rand_core::OsRng;

fn run_keygen(
    params: &ProtocolParameters,
    participants: &[Participant],
) -> Vec<(Participant, KeygenOutput)> {
    let session = SessionId::random(&mut OsRng);
    let mut protocols: Vec<(Participant, Box<dyn Protocol<Output = KeygenOutput> + '_>)> =
        Vec::with_capacity(participants.len());

    for p in participants.iter() {
        let protocol = keygen(params, participants, *p, session);
        assert!(protocol.is_ok());
        let protocol = protocol.unwrap();
        protocols.push((*p, Box::new(protocol)));
    }

    run_protocol(protocols).unwrap()
}

fn run_sign(
    params: &ProtocolParameters,
    decryption_key: &DecryptionKey,
    participants: &[Participant],
    key: &AggregateKey,
    msg: &[u8],
) -> Vec<(Participant, FullSignature)> {
    let request = SigningRequest::new(SessionId::random(&mut OsRng), key.clone(), msg);
    let finalizer = participants[0];
    let mut protocols: Vec<(Participant, Box<dyn Protocol<Output = FullSignature> + '_>)> =
        Vec::with_capacity(participants.len());

    for p in participants.iter() {
        let decryption_key = (*p == finalizer).then_some(decryption_key);
        let protocol = sign(
            params,
            participants,
            *p,
            request.clone(),
            finalizer,
            decryption_key,
        );
        assert!(protocol.is_ok());
        let protocol = protocol.unwrap();
        protocols.push((*p, Box::new(protocol)));
    }

    run_protocol(protocols).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let participants = vec![
        Participant::from(0u32),
        Participant::from(1u32),
        Participant::from(2u32),
    ];
    let config = ParameterConfig {
        safe_aux_primes: false,
        ..ParameterConfig::default()
    };
    let (params, decryption_key) = ProtocolParameters::generate(&mut OsRng, &config).unwrap();

    c.bench_function("lock-in 3", |b| {
        b.iter(|| run_keygen(black_box(&params), black_box(&participants)))
    });

    let keygen_result = run_keygen(&params, &participants);
    let key = keygen_result[0].1.key.clone();

    let msg = b"hello world";

    c.bench_function("lock-out 3", |b| {
        b.iter(|| {
            run_sign(
                black_box(&params),
                black_box(&decryption_key),
                black_box(&participants),
                black_box(&key),
                black_box(msg),
            )
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
