use clap::Parser;

use chip8_vm::Settings;
use chip8_vm::emulator::Emulator;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let settings = Settings::parse();
    settings.validate()?;

    let mut emulator = Emulator::new(settings);
    emulator.run()?;

    Ok(())
}
