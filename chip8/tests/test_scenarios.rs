use std::time::Duration;

use chip8::{constants::*, prelude::*};
use rand::prelude::*;

/// Screen, keyboard and speaker that only record what they're given.
#[derive(Default)]
struct Headless {
    keypad: Keypad,
    frames: usize,
    buzzer: bool,
}

impl Screen for Headless {
    fn draw(&mut self, _display: &Framebuffer) {
        self.frames += 1;
    }

    fn clear(&mut self) {}
}

impl Keyboard for Headless {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keypad.is_pressed(key)
    }

    fn poll_key_press(&mut self) -> Option<KeyCode> {
        self.keypad.poll_key_press()
    }
}

impl Speaker for Headless {
    fn buzz(&mut self, state: bool) {
        self.buzzer = state;
    }
}

fn new_vm(program: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        seed: Some(0xC8),
        ..Default::default()
    });
    vm.load_bytecode(program).unwrap();
    vm
}

#[test]
#[rustfmt::skip]
fn test_draw_font_glyph() {
    let mut program = vec![
        0x00, 0xE0, // CLS
        0x60, 0x00, // LD v0, 0
        0x61, 0x00, // LD v1, 0
        0xA0, 0x00, // LD I, 0x000
        0xD0, 0x15, // DRW v0, v1, 5
        0x12, 0x00, // JP 0x200
    ];
    program.resize(132, 0);

    let mut vm = new_vm(&program);
    let mut keypad = Keypad::new();
    for _ in 0..5 {
        vm.step(&mut keypad).unwrap();
    }

    let display = vm.framebuffer();
    let glyph = &FONTSET[..FONTSET_HEIGHT];
    for y in 0..DISPLAY_HEIGHT {
        for x in 0..DISPLAY_WIDTH {
            let expected = y < FONTSET_HEIGHT && x < 8 && (glyph[y] >> (7 - x)) & 1 == 1;
            assert_eq!(display.get(x, y), expected, "pixel ({x}, {y})");
        }
    }
    assert_eq!(display.count_lit(), 14);
    assert_eq!(vm.registers().v[0xF], 0);
}

#[test]
#[rustfmt::skip]
fn test_draw_twice_collides() {
    let mut vm = new_vm(&[
        0x60, 0x0A, // LD v0, 0x0A
        0xF0, 0x29, // LD F, v0
        0xD1, 0x15, // DRW v1, v1, 5
        0xD1, 0x15, // DRW v1, v1, 5
    ]);
    let mut keypad = Keypad::new();

    vm.run_steps(3, &mut keypad).unwrap();
    assert_eq!(vm.registers().i, 50);
    assert_eq!(vm.registers().v[0xF], 0);
    assert!(vm.framebuffer().count_lit() > 0);

    assert_eq!(vm.step(&mut keypad), Ok(Flow::Draw));
    assert_eq!(vm.registers().v[0xF], 1);
    assert_eq!(vm.framebuffer().count_lit(), 0);
}

#[test]
fn test_invalid_opcode_halts() {
    let mut vm = new_vm(&[0x5A, 0xAA]);
    let mut keypad = Keypad::new();

    let expected = Chip8Error::InvalidOpcode {
        opcode: 0x5AAA,
        address: 0x200,
    };
    assert_eq!(vm.step(&mut keypad), Err(expected.clone()));
    assert!(vm.is_halted());
    assert_eq!(vm.error(), Some(&expected));

    // The fault is only reported once.
    assert_eq!(vm.step(&mut keypad), Ok(Flow::Halted));
    assert_eq!(vm.run_steps(10, &mut keypad), Ok(Flow::Halted));

    // Loading a program brings the machine back.
    vm.load_bytecode(&[0x60, 0x01]).unwrap();
    assert_eq!(vm.step(&mut keypad), Ok(Flow::Ok));
    assert_eq!(vm.registers().v[0], 1);
}

#[test]
#[rustfmt::skip]
fn test_store_load_round_trip() {
    let mut vm = new_vm(&[
        0x60, 0x11, // LD v0, 0x11
        0x61, 0x22, // LD v1, 0x22
        0x62, 0x33, // LD v2, 0x33
        0xA3, 0x00, // LD I, 0x300
        0xF2, 0x55, // LD [I], v2
        0x60, 0x00, // LD v0, 0
        0x61, 0x00, // LD v1, 0
        0x62, 0x00, // LD v2, 0
        0xF1, 0x65, // LD v1, [I]
    ]);
    let mut keypad = Keypad::new();

    vm.run_steps(9, &mut keypad).unwrap();

    assert_eq!(vm.memory().read_range(0x300, 4), Ok(&[0x11, 0x22, 0x33, 0x00][..]));
    assert_eq!(&vm.registers().v[..3], &[0x11, 0x22, 0x00]);
    // I is left unchanged.
    assert_eq!(vm.registers().i, 0x300);
}

#[test]
#[rustfmt::skip]
fn test_subroutine_returns_after_call() {
    let mut vm = new_vm(&[
        0x22, 0x06, // 0x200 CALL 0x206
        0x61, 0x02, // 0x202 LD v1, 2
        0x12, 0x04, // 0x204 JP 0x204
        0x60, 0x01, // 0x206 LD v0, 1
        0x00, 0xEE, // 0x208 RET
    ]);
    let mut keypad = Keypad::new();

    assert_eq!(vm.step(&mut keypad), Ok(Flow::Jump));
    assert_eq!(vm.cpu().stack.frames(), &[0x202]);

    vm.run_steps(3, &mut keypad).unwrap();
    assert!(vm.cpu().stack.is_empty());
    assert_eq!(vm.registers().v[0], 1);
    assert_eq!(vm.registers().v[1], 2);
    assert_eq!(vm.registers().pc, 0x204);
}

/// However the elapsed time is sliced, ten seconds is exactly
/// 600 timer ticks and ten seconds worth of cycles.
#[test]
#[rustfmt::skip]
fn test_timer_cadence_is_exact() {
    const SECONDS: u64 = 10;
    const UPDATES: u64 = 600;
    let program = [
        0x60, 0xFF, // LD v0, 255
        0xF0, 0x15, // LD DT, v0
        0x12, 0x04, // JP 0x204
    ];

    let mut rng = StdRng::seed_from_u64(7);

    for frequency in [60, 500, 700, 1000] {
        let conf = Chip8Conf {
            clock_frequency: Some(Hz(frequency)),
            seed: Some(0),
            ..Default::default()
        };
        let mut scheduler = Scheduler::new(&conf).unwrap();
        let mut vm = Chip8Vm::new(conf);
        vm.load_bytecode(&program).unwrap();
        let mut devices = Headless::default();

        // Uneven slices, with the last one making up the remainder.
        let total = SECONDS * NANOS_IN_SECOND;
        let mut slices = (0..UPDATES - 1)
            .map(|_| rng.gen_range(0..=total / UPDATES))
            .collect::<Vec<_>>();
        slices.push(total - slices.iter().sum::<u64>());

        let mut cycles = 0;
        let mut timer_ticks = 0;
        for nanos in slices {
            let report = scheduler
                .update(&mut vm, &mut devices, Duration::from_nanos(nanos))
                .unwrap();
            cycles += report.cycles;
            timer_ticks += report.timer_ticks;
        }

        assert_eq!(timer_ticks, 600, "{frequency}Hz");
        assert_eq!(cycles as u64, frequency * SECONDS, "{frequency}Hz");
        assert_eq!(devices.frames, 600);
        assert_eq!(vm.timers().delay, 0);
    }
}

#[test]
#[rustfmt::skip]
fn test_key_wait_through_scheduler() {
    let conf = Chip8Conf::default();
    let mut scheduler = Scheduler::new(&conf).unwrap();
    let mut vm = Chip8Vm::new(conf);
    vm.load_bytecode(&[
        0xF3, 0x0A, // LD v3, K
        0x64, 0x01, // LD v4, 1
        0x12, 0x04, // JP 0x204
    ]).unwrap();
    let mut devices = Headless::default();

    // Keys pressed before the wait don't satisfy it,
    // whether still held or already released.
    devices.keypad.press(KeyCode::KeyE);
    devices.keypad.press(KeyCode::Key1);
    devices.keypad.release(KeyCode::Key1);

    scheduler.update(&mut vm, &mut devices, Duration::from_secs(2)).unwrap();
    assert!(vm.is_waiting());
    assert_eq!(vm.registers().v[4], 0);

    devices.keypad.press(KeyCode::KeyB);
    scheduler.update(&mut vm, &mut devices, Duration::from_millis(10)).unwrap();
    assert_eq!(vm.registers().v[3], 0xB);
    assert_eq!(vm.registers().v[4], 1);
}

#[test]
#[rustfmt::skip]
fn test_sound_timer_drives_speaker() {
    let conf = Chip8Conf::default();
    let mut scheduler = Scheduler::new(&conf).unwrap();
    let mut vm = Chip8Vm::new(conf);
    vm.load_bytecode(&[
        0x60, 0x1E, // LD v0, 30
        0xF0, 0x18, // LD ST, v0
        0x12, 0x04, // JP 0x204
    ]).unwrap();
    let mut devices = Headless::default();

    scheduler.update(&mut vm, &mut devices, Duration::from_millis(100)).unwrap();
    assert!(devices.buzzer);

    // 30 ticks is half a second.
    scheduler.update(&mut vm, &mut devices, Duration::from_millis(500)).unwrap();
    assert!(!devices.buzzer);
    assert_eq!(vm.timers().sound, 0);
}
