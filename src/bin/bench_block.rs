use htj2k_rs::{CodeBlockParams, CodingPasses, HTBlockDecoder, HTBlockEncoder, HtSample};
use std::time::Instant;

/// Laplacian-looking coefficients: mostly small, occasionally large.
fn test_block(len: usize, k_max: u32) -> Vec<u32> {
    let mut state = 0x9E37_79B9u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let magnitude = (state >> 8) & ((1 << k_max) - 1);
            let value = (magnitude >> (state % k_max)) as i64;
            let value = if state & 1 == 1 { -value } else { value };
            u32::from_coefficient(value, k_max)
        })
        .collect()
}

fn main() {
    println!("Benchmarking HT block coding...");

    let k_max = 12;
    let iterations = 20_000;
    let params = CodeBlockParams::new(64, 64, k_max - 2).with_passes(CodingPasses::MagRef);
    let samples = test_block(64 * 64, k_max);
    let encoder = HTBlockEncoder::new();
    let decoder = HTBlockDecoder::new();

    let start = Instant::now();
    let mut coded = None;
    for _ in 0..iterations {
        coded = encoder.encode(&samples, &params).ok();
        std::hint::black_box(&coded);
    }
    let duration_encode = start.elapsed();
    let Some(coded) = coded else {
        println!("Encoding failed");
        return;
    };
    println!(
        "Encode: {:?} for {} iterations ({} + {} bytes, {} passes)",
        duration_encode,
        iterations,
        coded.lengths.cleanup,
        coded.lengths.refinement,
        coded.num_passes.count()
    );

    let params = params.with_passes(coded.num_passes);
    let mut output = vec![0u32; samples.len()];
    let start = Instant::now();
    for _ in 0..iterations {
        if let Err(e) = decoder.decode(&coded.data, coded.lengths, &params, &mut output) {
            println!("Decoding failed: {}", e);
            return;
        }
        std::hint::black_box(&output);
    }
    let duration_decode = start.elapsed();
    println!("Decode: {:?} for {} iterations", duration_decode, iterations);

    let samples_per_sec = (iterations * samples.len()) as f64 / duration_decode.as_secs_f64();
    println!("Decode throughput: {:.1} Msamples/s", samples_per_sec / 1e6);

    // Cleanup-significant samples come back exactly down to the refined plane
    let shift = u32::BITS - 1 - k_max;
    let mismatches = samples
        .iter()
        .zip(&output)
        .filter(|&(&s, &d)| s.magnitude() >> (shift + 1) != 0 && s >> shift != d >> shift)
        .count();
    if mismatches == 0 {
        println!("Accuracy: PASSED");
    } else {
        println!("Accuracy: FAILED ({} samples differ)", mismatches);
    }
}
