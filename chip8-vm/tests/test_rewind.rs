use chip8_vm::prelude::*;
use proptest::prelude::*;

/// Instructions without randomness, key input or control flow.
///
/// Register dumps and loads come with their own `LD I`, so they never
/// overwrite the program.
fn instruction() -> impl Strategy<Value = Vec<u16>> {
    let x = 0u16..0x10;
    let y = 0u16..0x10;
    prop_oneof![
        Just(vec![0x00E0]),
        (x.clone(), any::<u8>()).prop_map(|(x, nn)| vec![0x6000 | x << 8 | nn as u16]),
        (x.clone(), any::<u8>()).prop_map(|(x, nn)| vec![0x7000 | x << 8 | nn as u16]),
        (x.clone(), y, prop::sample::select(vec![0u16, 1, 2, 3, 4, 5, 6, 7, 0xE]))
            .prop_map(|(x, y, n)| vec![0x8000 | x << 8 | y << 4 | n]),
        (0x300u16..0x1000).prop_map(|nnn| vec![0xA000 | nnn]),
        (x.clone(), 0u16..0x10).prop_map(|(x, n)| vec![0xD010 | x << 8 | n]),
        (x.clone(), prop::sample::select(vec![0x15u16, 0x18, 0x29, 0x33]))
            .prop_map(|(x, nn)| vec![0xF000 | x << 8 | nn]),
        (0x300u16..0x1000, x, prop::sample::select(vec![0x55u16, 0x65]))
            .prop_map(|(nnn, x, nn)| vec![0xA000 | nnn, 0xF000 | x << 8 | nn]),
    ]
}

fn program() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(instruction(), 1..40).prop_map(|words| words.concat())
}

fn assemble(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

proptest! {
    #[test]
    fn rewind_restores_initial_state(words in program()) {
        let mut vm = Chip8Vm::headless(Chip8Conf::default());
        vm.load_bytecode(&assemble(&words)).unwrap();
        let start = vm.snapshot();

        for _ in 0..words.len() {
            vm.step().unwrap();
        }
        prop_assert_eq!(vm.history_len(), words.len());

        for _ in 0..words.len() {
            prop_assert!(vm.rewind());
        }
        prop_assert!(vm.snapshot() == start);
        prop_assert!(!vm.rewind());
    }

    #[test]
    fn rewind_each_step(words in program()) {
        let mut vm = Chip8Vm::headless(Chip8Conf::default());
        vm.load_bytecode(&assemble(&words)).unwrap();

        for _ in 0..words.len() {
            let before = vm.snapshot();
            vm.step().unwrap();
            let after = vm.snapshot();

            prop_assert!(vm.rewind());
            prop_assert!(vm.snapshot() == before);

            vm.step().unwrap();
            prop_assert!(vm.snapshot() == after);
        }
    }
}

#[test]
#[rustfmt::skip]
fn test_rewind_restores_control_state_after_random() {
    let mut vm = Chip8Vm::headless(Chip8Conf::default());
    vm.load_bytecode(&[
        0xC0, 0xFF, // RND v0, 0xFF
        0x22, 0x06, // CALL 0x206
        0x00, 0x00,
        0xF1, 0x0A, // LD v1, K
    ]).unwrap();
    let start = vm.snapshot();

    vm.run_steps(4).unwrap();
    assert_eq!(vm.cpu().key_wait(), Some(1));
    assert_eq!(vm.cpu().stack(), &[0x204]);

    for _ in 0..4 {
        assert!(vm.rewind());
    }
    assert!(vm.snapshot() == start);
}

#[test]
fn test_history_is_bounded() {
    let mut vm = Chip8Vm::headless(Chip8Conf {
        history_capacity: 8,
        ..Chip8Conf::default()
    });
    // JP 0x200
    vm.load_bytecode(&[0x12, 0x00]).unwrap();

    vm.run_steps(20).unwrap();
    assert_eq!(vm.history_len(), 8);

    let mut rewound = 0;
    while vm.rewind() {
        rewound += 1;
    }
    assert_eq!(rewound, 8);
}

#[test]
fn test_load_clears_history() {
    let mut vm = Chip8Vm::headless(Chip8Conf::default());
    vm.load_bytecode(&[0x12, 0x00]).unwrap();
    vm.run_steps(3).unwrap();

    vm.load_bytecode(&[0x12, 0x00]).unwrap();
    assert_eq!(vm.history_len(), 0);
    assert!(!vm.rewind());
}
