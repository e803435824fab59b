use glottal::{ModelType, Voice, VoiceParms};
use hound::{SampleFormat, WavSpec, WavWriter};
use rand::SeedableRng;
use rand::rngs::SmallRng;

const SAMPLE_RATE: u32 = 44_100;
const BLOCK: usize = 512;

/// Renders two seconds of /a/, gliding to /i/ halfway through, into `vowel.wav`.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let model = std::env::args()
        .nth(1)
        .map(|name| name.parse::<ModelType>())
        .transpose()?
        .unwrap_or_default();

    let parms = VoiceParms {
        sample_rate: f64::from(SAMPLE_RATE),
        model,
        normalized: true,
        ..VoiceParms::default()
    };
    let (mut voice, mut controls) = Voice::new(parms, SmallRng::seed_from_u64(69))?;
    controls.source.f0.set_value(110.0);

    let mut wav = WavWriter::create(
        "vowel.wav",
        WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let total = 2 * SAMPLE_RATE as usize;
    let mut block = vec![0.0_f32; BLOCK];
    let mut written = 0;
    while written < total {
        if written >= total / 2 && written < total / 2 + BLOCK {
            let targets = [280.0, 2250.0, 2900.0];
            for (param, value) in controls.formants.frequencies.iter_mut().zip(targets) {
                param.set_value(value);
            }
            controls.source.f0.set_value(130.0);
        }
        voice.fill_buffer_f32(&mut block);
        for &sample in &block {
            wav.write_sample(0.5 * sample)?;
        }
        written += BLOCK;
    }
    wav.finalize()?;

    println!("wrote vowel.wav with the {model} model");
    Ok(())
}
