use glottal::{ModelType, Voice, VoiceParms};
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn main() {
    run_generate_sound();
    run_generate_vocal();
}

fn get_parms() -> VoiceParms {
    VoiceParms {
        sample_rate: 44_100.0,
        model: ModelType::Lf,
        ..VoiceParms::default()
    }
}

fn run_generate_sound() {
    let voice = Voice::new(get_parms(), SmallRng::seed_from_u64(69));
    match voice {
        Ok((mut voice, _controls)) => {
            let mut sound = vec![0.0; 4410];
            voice.fill_buffer(&mut sound);
            println!("Sound: {:#?}", &sound[0..20]);
        }
        Err(error) => {
            println!("Error: {error}");
            std::process::exit(1);
        }
    }
}

fn run_generate_vocal() {
    match Voice::new(get_parms(), SmallRng::seed_from_u64(69)) {
        Ok((voice, _controls)) => {
            println!("Vocal: {:#?}", voice.formants().generator().sos_coefficients());
        }
        Err(error) => {
            println!("Error: {error}");
            std::process::exit(1);
        }
    }
}
