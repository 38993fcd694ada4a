use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::chip8::{Chip8, StepResult};
use crate::config::Settings;
use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH, Framebuffer};
use crate::keymap;
use crate::keypad::Key;

/// Renders the framebuffer as rows of block characters.
pub fn render_screen(display: &Framebuffer) -> String {
    let mut screen = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT * 3);
    for row in display.rows() {
        for pixel in row.iter() {
            screen.push(if *pixel { '█' } else { ' ' });
        }
        screen.push('\n');
    }
    screen
}

/// Terminal front end: owns the machine and drives it in real time.
pub struct Emulator {
    chip8: Chip8,
    settings: Settings,
    screen: String,
    held: Vec<Key>,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        let chip8 = match settings.seed {
            Some(seed) => Chip8::with_seed(settings.quirks, seed),
            None => Chip8::new(settings.quirks),
        };
        Emulator {
            chip8,
            settings,
            screen: String::new(),
            held: Vec::new(),
        }
    }

    pub fn chip8(&self) -> &Chip8 {
        &self.chip8
    }

    pub fn load_rom_file(&mut self) -> anyhow::Result<()> {
        let path = &self.settings.rom;
        let rom_data =
            std::fs::read(path).with_context(|| format!("failed to read ROM {}", path.display()))?;
        self.chip8
            .load_rom(&rom_data)
            .with_context(|| format!("failed to load ROM {}", path.display()))?;
        Ok(())
    }

    /// Runs one display frame worth of emulation: a timer tick followed by
    /// up to `ips / frame_rate` instructions. Stops early while the machine
    /// waits for a key.
    pub fn run_frame(&mut self) -> anyhow::Result<()> {
        self.chip8.tick();
        for _ in 0..self.settings.instructions_per_frame() {
            match self.chip8.step().context("emulation halted")? {
                StepResult::Ready => {}
                StepResult::Blocked => break,
            }
        }
        Ok(())
    }

    fn draw(&self, frame: &mut ratatui::Frame, rom_name: &str) {
        let area = frame.area();
        let game_width = (DISPLAY_WIDTH as u16) + 2;
        let game_height = (DISPLAY_HEIGHT as u16) + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(game_height),
                Constraint::Length(3),
                Constraint::Length(7),
                Constraint::Min(0),
            ])
            .split(area);

        let game_area = if chunks[0].width > game_width {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Min(0),
                    Constraint::Length(game_width),
                    Constraint::Min(0),
                ])
                .split(chunks[0])[1]
        } else {
            chunks[0]
        };

        let game = Paragraph::new(self.screen.as_str())
            .block(Block::default().borders(Borders::ALL).title(rom_name))
            .style(Style::default().fg(Color::White));
        frame.render_widget(game, game_area);

        let status = Paragraph::new(self.status_line())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("State"))
            .style(Style::default().fg(Color::Green));
        frame.render_widget(status, chunks[1]);

        let keys = Paragraph::new(keymap::LEGEND)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Keypad"))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(keys, chunks[2]);
    }

    fn status_line(&self) -> String {
        let chip8 = &self.chip8;
        let mut status = format!(
            "PC {:#05X}  I {:#05X}  DT {:3}  ST {:3}",
            chip8.pc, chip8.index, chip8.timers.delay, chip8.timers.sound
        );
        if chip8.timers.sound_active() {
            status.push_str("  BEEP");
        }
        if chip8.is_waiting_for_key() {
            status.push_str("  waiting for key");
        }
        status
    }

    /// Drains pending terminal events. Returns false once the user asked to quit.
    fn poll_input(&mut self) -> anyhow::Result<bool> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if !self.handle_key(key.code, key.kind) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Applies one terminal key event to the keypad. Returns false on `Esc`.
    fn handle_key(&mut self, code: KeyCode, kind: KeyEventKind) -> bool {
        if code == KeyCode::Esc {
            return false;
        }
        let Some(key) = keymap::key_for(code) else {
            return true;
        };
        match kind {
            KeyEventKind::Release => {
                self.chip8.keypad.release_key(key);
                self.held.retain(|k| *k != key);
            }
            _ => {
                self.chip8.keypad.press_key(key);
                self.held.push(key);
            }
        }
        true
    }

    /// Most terminals never report key releases, so a press only lasts for
    /// the frame it arrived in. Presses no wait instruction consumed during
    /// the frame are dropped with it.
    fn end_frame(&mut self) {
        for key in self.held.drain(..) {
            self.chip8.keypad.release_key(key);
        }
        self.chip8.keypad.clear_latch();
    }

    fn main_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        rom_name: &str,
    ) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);

        loop {
            let frame_start = Instant::now();

            if !self.poll_input()? {
                log::info!("quit requested");
                return Ok(());
            }

            self.run_frame()?;

            if self.chip8.display.take_dirty() {
                self.screen = render_screen(&self.chip8.display);
            }
            terminal.draw(|frame| self.draw(frame, rom_name))?;
            self.end_frame();

            let elapsed = frame_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        self.load_rom_file()?;
        let rom_name = self.settings.rom_stem();
        log::info!(
            "running {} at {} instructions/s, {} Hz",
            rom_name,
            self.settings.ips,
            self.settings.frame_rate
        );

        enable_raw_mode()?;
        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.main_loop(&mut terminal, &rom_name);

        let raw_mode = disable_raw_mode();
        let cleared = terminal.clear();
        finish(result, raw_mode, cleared)
    }
}

/// Combines the outcome of a run with the terminal restore steps, which have
/// all been attempted already. The run's own error is reported first.
fn finish(
    result: anyhow::Result<()>,
    raw_mode: std::io::Result<()>,
    cleared: std::io::Result<()>,
) -> anyhow::Result<()> {
    result?;
    raw_mode.context("failed to leave raw mode")?;
    cleared.context("failed to clear the terminal")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Register;

    fn emulator_with_rom(rom: &[u8]) -> Emulator {
        let mut settings = Settings::new("test.ch8");
        settings.seed = Some(1);
        settings.ips = 600;
        let mut emulator = Emulator::new(settings);
        emulator.chip8.load_rom(rom).unwrap();
        emulator
    }

    #[test]
    fn render_screen_draws_lit_pixels() {
        let mut display = Framebuffer::new();
        display.draw(&[0xC0], 0, 0);

        let screen = render_screen(&display);
        let lines: Vec<&str> = screen.lines().collect();
        assert_eq!(lines.len(), DISPLAY_HEIGHT);
        assert!(lines[0].starts_with("██ "));
        assert_eq!(lines[0].chars().count(), DISPLAY_WIDTH);
        assert!(lines[1].chars().all(|c| c == ' '));
    }

    #[test]
    fn run_frame_ticks_timers_once_and_runs_a_frame_of_instructions() {
        // LD V0, 0x20 ; LD DT, V0 ; ADD V1, 1 ; JP 0x204
        let mut emulator = emulator_with_rom(&[0x60, 0x20, 0xF0, 0x15, 0x71, 0x01, 0x12, 0x04]);
        emulator.run_frame().unwrap();

        let chip8 = emulator.chip8();
        assert_eq!(chip8.timers.delay, 0x20);
        // 10 instructions: two setup, then four ADD/JP pairs.
        assert_eq!(chip8.registers.read(Register::V1), 4);

        emulator.run_frame().unwrap();
        assert_eq!(emulator.chip8().timers.delay, 0x1F);
    }

    #[test]
    fn run_frame_stops_while_blocked() {
        let mut emulator = emulator_with_rom(&[0xF0, 0x0A, 0x12, 0x02]);
        emulator.run_frame().unwrap();
        assert_eq!(emulator.chip8().pc, 0x200);
        assert!(emulator.status_line().contains("waiting for key"));

        emulator.chip8.keypad.press_key(Key::Key9);
        emulator.run_frame().unwrap();
        assert_eq!(emulator.chip8().registers.read(Register::V0), 9);
    }

    #[test]
    fn key_pressed_in_the_frame_a_wait_starts_is_consumed() {
        // LD V0, 1 ; LD V0, K ; JP 0x204
        let mut emulator = emulator_with_rom(&[0x60, 0x01, 0xF0, 0x0A, 0x12, 0x04]);

        assert!(emulator.handle_key(KeyCode::Char('d'), KeyEventKind::Press));
        emulator.run_frame().unwrap();
        emulator.end_frame();
        for _ in 0..5 {
            emulator.run_frame().unwrap();
            emulator.end_frame();
        }

        assert_eq!(emulator.chip8().registers.read(Register::V0), 9);
        assert!(!emulator.chip8().is_waiting_for_key());
        assert!(!emulator.chip8().keypad.is_pressed(Key::Key9));
    }

    #[test]
    fn key_pressed_in_a_later_frame_releases_a_wait() {
        let mut emulator = emulator_with_rom(&[0xF0, 0x0A, 0x12, 0x02]);
        emulator.run_frame().unwrap();
        emulator.end_frame();
        assert!(emulator.chip8().is_waiting_for_key());

        emulator.handle_key(KeyCode::Char('v'), KeyEventKind::Press);
        emulator.run_frame().unwrap();
        emulator.end_frame();
        assert_eq!(emulator.chip8().registers.read(Register::V0), 0xF);
    }

    #[test]
    fn unconsumed_presses_expire_with_the_frame() {
        // JP 0x200 spins for a frame, then becomes LD V0, K.
        let mut emulator = emulator_with_rom(&[0x12, 0x00]);
        emulator.handle_key(KeyCode::Char('q'), KeyEventKind::Press);
        emulator.run_frame().unwrap();
        emulator.end_frame();

        emulator.chip8.memory.write_slice(0x200, &[0xF0, 0x0A]).unwrap();
        emulator.run_frame().unwrap();
        assert!(emulator.chip8().is_waiting_for_key());
    }

    #[test]
    fn escape_requests_quit() {
        let mut emulator = emulator_with_rom(&[0x12, 0x00]);
        assert!(!emulator.handle_key(KeyCode::Esc, KeyEventKind::Press));
        assert!(emulator.handle_key(KeyCode::Char('p'), KeyEventKind::Press));
    }

    #[test]
    fn finish_reports_restore_failures_after_a_clean_run() {
        let clear_failed =
            || -> std::io::Result<()> { Err(std::io::Error::other("clear failed")) };

        assert!(finish(Ok(()), Ok(()), Ok(())).is_ok());

        let err = finish(Ok(()), Ok(()), clear_failed()).unwrap_err();
        assert!(format!("{err:#}").contains("clear failed"));

        let err = finish(Err(anyhow::anyhow!("halted")), Ok(()), clear_failed()).unwrap_err();
        assert_eq!(err.to_string(), "halted");
    }

    #[test]
    fn run_frame_surfaces_faults() {
        let mut emulator = emulator_with_rom(&[0x00, 0xEE]);
        let err = emulator.run_frame().unwrap_err();
        assert!(format!("{err:#}").contains("stack underflow"));
    }

    #[test]
    fn missing_rom_file_is_reported_with_its_path() {
        let mut emulator = Emulator::new(Settings::new("/nonexistent/rom.ch8"));
        let err = emulator.load_rom_file().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rom.ch8"));
    }
}
