use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Create config template if it doesn't exist
    let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "./".to_string());
    let template_path = Path::new(&out_dir).join("../../../config.template.toml");

    let template = r#"# WFDIO Configuration Template
# Copy this file to 'config.toml' and fill in your actual values

# Address the source announces in the WFD presentation URL
host_address = "192.168.49.1"

# PulseAudio monitor device used for audio capture
audio_device = "alsa_output.1.analog-stereo.monitor"
"#;

    let _ = fs::write(template_path, template);
    println!("cargo:rerun-if-changed=build.rs");
}
