use super::*;

const CMOS: MuxTechnology = MuxTechnology::PassTransistorCmos;
const RRAM: MuxTechnology = MuxTechnology::ResistiveTwoTerminal;

fn circuit(topology: MuxTopology, technology: MuxTechnology) -> MuxCircuit {
    MuxCircuit { topology, technology }
}

fn bits_of(model: &MuxModel, path: usize) -> String {
    model.encode(path).unwrap().to_string()
}

#[test]
fn test_tree_of_five() {
    let model = MuxModel::new(5, circuit(MuxTopology::Tree, CMOS)).unwrap();

    assert_eq!(model.num_levels, 3);
    assert_eq!(model.basis_size, 2);
    assert_eq!(model.num_conf_bits(), 3);
    assert_eq!(model.num_reserved_conf_bits(), 0);

    let three = model.encode(3).unwrap();
    assert_eq!(three, ConfigBits::from_bools(&[true, true, false]));

    let zero = model.encode(0).unwrap();
    for path in 1 .. 5 {
        assert_ne!(zero, model.encode(path).unwrap(), "path {}", path);
    }
}

#[test]
fn test_input_positions() {
    let model = MuxModel::new(5, circuit(MuxTopology::Tree, CMOS)).unwrap();
    for path in 0 .. 4 {
        assert_eq!(model.inputs[path], MuxInputPosition { level: 0, offset: path });
    }
    /* The odd input skips the first two stages */
    assert_eq!(model.inputs[4], MuxInputPosition { level: 2, offset: 1 });

    let model = MuxModel::new(3, circuit(MuxTopology::Tree, RRAM)).unwrap();
    assert_eq!(model.inputs[2], MuxInputPosition { level: 1, offset: 1 });

    let model = MuxModel::new(4, circuit(MuxTopology::Tree, CMOS)).unwrap();
    assert!(model.inputs.iter().all(|pos| pos.level == 0));

    let model = MuxModel::new(7, circuit(MuxTopology::OneLevel, CMOS)).unwrap();
    assert_eq!(model.num_levels, 1);
    assert_eq!(model.inputs[6], MuxInputPosition { level: 0, offset: 6 });
}

#[test]
fn test_one_level_cmos_is_one_hot() {
    let model = MuxModel::new(4, circuit(MuxTopology::OneLevel, CMOS)).unwrap();
    assert_eq!(bits_of(&model, 0), "1000");
    assert_eq!(bits_of(&model, 2), "0010");
}

#[test]
fn test_one_level_rram_boundary_columns() {
    let model = MuxModel::new(4, circuit(MuxTopology::OneLevel, RRAM)).unwrap();
    assert_eq!(model.num_conf_bits(), 8);
    assert_eq!(model.num_reserved_conf_bits(), 4);

    assert_eq!(bits_of(&model, 0), "10001000");
    assert_eq!(bits_of(&model, 1), "01000010");
    assert_eq!(bits_of(&model, 2), "00100001");
    assert_eq!(bits_of(&model, 3), "00010001");
}

#[test]
fn test_tree_rram_levels() {
    let model = MuxModel::new(4, circuit(MuxTopology::Tree, RRAM)).unwrap();
    assert_eq!(model.num_conf_bits(), 12);
    assert_eq!(model.num_reserved_conf_bits(), 3);
    /* level 0 selects branch 0, level 1 selects branch 1 */
    assert_eq!(bits_of(&model, 2), "101100011010");
}

#[test]
fn test_multi_level_basis() {
    let model = MuxModel::new(16, circuit(MuxTopology::MultiLevel(2), CMOS)).unwrap();
    assert_eq!(model.basis_size, 4);
    assert_eq!(model.num_conf_bits(), 8);
    assert_eq!(bits_of(&model, 6), "00100100");

    let model = MuxModel::new(5, circuit(MuxTopology::MultiLevel(2), CMOS)).unwrap();
    assert_eq!(model.basis_size, 3);

    /* With a basis of two, a multi-level mux is a tree */
    let multi = MuxModel::new(8, circuit(MuxTopology::MultiLevel(3), CMOS)).unwrap();
    let tree = MuxModel::new(8, circuit(MuxTopology::Tree, CMOS)).unwrap();
    assert_eq!(multi.basis_size, 2);
    for path in 0 .. 8 {
        assert_eq!(multi.encode(path).unwrap(), tree.encode(path).unwrap());
    }
}

#[test]
fn test_encode_decode_all_circuits() {
    let topologies = [
        MuxTopology::OneLevel,
        MuxTopology::Tree,
        MuxTopology::MultiLevel(2),
        MuxTopology::MultiLevel(3),
    ];

    for size in [2, 3, 4, 5, 8, 16] {
        for topology in topologies {
            for technology in [CMOS, RRAM] {
                let model = MuxModel::new(size, circuit(topology, technology)).unwrap();
                let encoded: Vec<ConfigBits> = (0 .. size)
                    .map(|path| model.encode(path).unwrap())
                    .collect();

                for (path, bits) in encoded.iter().enumerate() {
                    assert_eq!(bits.len(), model.num_conf_bits());
                    assert_eq!(
                        model.decode(bits),
                        Some(path),
                        "size {} {:?} {:?} bits {}",
                        size, topology, technology, bits
                    );
                    for other in path + 1 .. size {
                        assert_ne!(bits, &encoded[other]);
                    }
                }
            }
        }
    }
}

#[test]
fn test_decode_rejects_illegal_bits() {
    let model = MuxModel::new(4, circuit(MuxTopology::OneLevel, CMOS)).unwrap();
    assert_eq!(model.decode(&ConfigBits::zeros(4)), None);
    assert_eq!(model.decode(&ConfigBits::from_bools(&[true, true, false, false])), None);
    assert_eq!(model.decode(&ConfigBits::zeros(3)), None);

    let model = MuxModel::new(4, circuit(MuxTopology::Tree, RRAM)).unwrap();
    let mut bits = model.encode(1).unwrap();
    /* Drop the always-on row of the first level */
    bits.set(2, false);
    assert_eq!(model.decode(&bits), None);
}

#[test]
fn test_invalid_requests() {
    let model = MuxModel::new(5, circuit(MuxTopology::Tree, CMOS)).unwrap();
    assert!(matches!(
        model.encode(5),
        Err(AnnotationError::PathOutOfRange { path: 5, size: 5 })
    ));

    assert!(matches!(
        MuxModel::new(1, MuxCircuit::default()),
        Err(AnnotationError::InvalidMuxSize { size: 1, .. })
    ));
    assert!(MuxModel::new(4, circuit(MuxTopology::MultiLevel(0), CMOS)).is_err());
}

#[test]
fn test_library_dedup() {
    let mut lib = MuxLibrary::new();
    let tree = circuit(MuxTopology::Tree, CMOS);

    lib.get(4, tree).unwrap();
    lib.get(4, tree).unwrap();
    assert_eq!(lib.len(), 1);

    lib.get(4, circuit(MuxTopology::Tree, RRAM)).unwrap();
    lib.get(6, tree).unwrap();
    assert_eq!(lib.len(), 3);

    assert_eq!(lib.encode(6, tree, 5).unwrap().to_string(), "101");
    assert!(lib.get(0, tree).is_err());
    assert_eq!(lib.len(), 3);
}
