use glottal::{Voice, VoiceParms};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::io::Cursor;

/// When comparing against the written samples, consider differences in value of:
/// 0.0000000001 to be acceptable.
const EPSILON: f32 = 1E-10;

fn render(seed: u64, samples: usize) -> Vec<f32> {
    let parms = VoiceParms {
        sample_rate: 16_000.0,
        ..VoiceParms::default()
    };
    let (mut voice, _controls) = Voice::new(parms, SmallRng::seed_from_u64(seed)).unwrap();
    let mut sound = vec![0.0_f32; samples];
    for block in sound.chunks_mut(400) {
        voice.fill_buffer_f32(block);
    }
    sound
}

#[test]
fn rendered_vowel_survives_a_wav_round_trip() {
    let sound = render(69, 16_000);
    let spec = WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut wav = WavWriter::new(&mut cursor, spec).unwrap();
        for &sample in &sound {
            wav.write_sample(sample).unwrap();
        }
        wav.finalize().unwrap();
    }

    let reader = WavReader::new(Cursor::new(cursor.into_inner())).unwrap();
    assert_eq!(reader.spec(), spec);
    let read: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
    assert_eq!(read.len(), sound.len());
    for (r, s) in read.iter().zip(&sound) {
        assert!((r - s).abs() <= EPSILON);
    }
}

#[test]
fn same_seed_same_sound() {
    assert_eq!(render(5, 4000), render(5, 4000));
    assert_ne!(render(5, 4000), render(6, 4000));
}
