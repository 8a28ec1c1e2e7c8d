mod util;
use util::*;

use mesh_ami::algs::communicator::NoComm;
use mesh_ami::data::dict::{PatchDict, TransformKind};
use mesh_ami::mesh_error::MeshAmiError;
use mesh_ami::topology::boundary::BoundaryMesh;

const Z: [f64; 3] = [0.0, 0.0, 1.0];
const O: [f64; 3] = [0.0, 0.0, 0.0];

fn sector(angle: Option<f64>) -> BoundaryMesh {
    BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 3, 2, false, PatchDict::coupled("right").with_rotation(Z, O, angle)),
        radial_patch("right", 30.0, 3, 2, true, PatchDict::coupled("left").with_rotation(Z, O, angle)),
    ])
    .unwrap()
}

#[test]
fn inferred_rotation_maps_owner_onto_neighbour() {
    let mut mesh = sector(None);
    mesh.update_couplings(&NoComm).unwrap();
    let t = mesh.coupling(0).unwrap().transform().unwrap();

    assert_eq!(t.kind, TransformKind::Rotational);
    assert!(!t.collocated);
    assert!(t.resolved);
    assert_close(t.rotation_angle_deg.unwrap(), 30.0, 1e-9);
    assert!(t.forward.compose(&t.reverse).is_identity(1e-12));

    let (left, right) = (mesh.patch(0).unwrap(), mesh.patch(1).unwrap());
    for (c_left, c_right) in left.face_centres().iter().zip(right.face_centres()) {
        assert_vec_close(t.reverse.transform_position(*c_left), *c_right, 1e-9);
        assert_vec_close(t.forward.transform_position(*c_right), *c_left, 1e-9);
    }

    let rows = mesh.coupling(0).unwrap().rows().unwrap();
    for (face, (a, w)) in rows.address.iter().zip(rows.weights).enumerate() {
        assert_eq!(a, &vec![face]);
        assert_close(w[0], 1.0, 1e-9);
    }
}

#[test]
fn neighbour_view_reverses_the_transform() {
    let mut mesh = sector(None);
    mesh.update_couplings(&NoComm).unwrap();
    let owner = mesh.coupling(0).unwrap().transform().unwrap();
    let nbr = mesh.coupling(1).unwrap().transform().unwrap();

    assert_close(nbr.rotation_angle_deg.unwrap(), -30.0, 1e-9);
    assert_eq!(nbr.reverse, owner.forward);
    assert_eq!(nbr.forward, owner.reverse);
}

#[test]
fn given_angle_takes_the_sign_that_balances_areas() {
    // sector [-30, 0]: owner on its high side, neighbour on its low side
    let angle = Some(30.0);
    let mut mesh = BoundaryMesh::new(vec![
        radial_patch("hi", 0.0, 2, 2, true, PatchDict::coupled("lo").with_rotation(Z, O, angle)),
        radial_patch("lo", -30.0, 2, 2, false, PatchDict::coupled("hi").with_rotation(Z, O, angle)),
    ])
    .unwrap();
    mesh.update_couplings(&NoComm).unwrap();
    let t = mesh.coupling(0).unwrap().transform().unwrap();
    assert_eq!(t.rotation_angle_deg, Some(-30.0));

    let mut mesh = sector(Some(30.0));
    mesh.update_couplings(&NoComm).unwrap();
    let given = mesh.coupling(0).unwrap().transform().unwrap();
    assert_eq!(given.rotation_angle_deg, Some(30.0));

    let mut inferred = sector(None);
    inferred.update_couplings(&NoComm).unwrap();
    let inferred = inferred.coupling(0).unwrap().transform().unwrap();
    assert!(given.reverse.approx_eq(&inferred.reverse, 1e-9));
}

#[test]
fn poor_angle_match_is_not_fatal() {
    let mut dict = PatchDict::coupled("right").with_rotation(Z, O, Some(45.0));
    dict.require_match = Some(false);
    let mut mesh = BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 2, 2, false, dict),
        radial_patch("right", 30.0, 2, 2, true, PatchDict::coupled("left").with_rotation(Z, O, Some(45.0))),
    ])
    .unwrap();
    mesh.update_couplings(&NoComm).unwrap();
    let t = mesh.coupling(0).unwrap().transform().unwrap();
    assert_eq!(t.rotation_angle_deg, Some(45.0));
}

#[test]
fn translational_pair_uses_the_separation_vector() {
    let mut mesh = BoundaryMesh::new(vec![
        x_plane_patch("inlet", 0.0, false, PatchDict::coupled("outlet").with_translation([4.0, 0.0, 0.0])),
        x_plane_patch("outlet", 4.0, true, PatchDict::coupled("inlet").with_translation([-4.0, 0.0, 0.0])),
    ])
    .unwrap();
    mesh.update_couplings(&NoComm).unwrap();

    let t = mesh.coupling(0).unwrap().transform().unwrap();
    assert_eq!(t.kind, TransformKind::Translational);
    assert_eq!(t.separation(), [4.0, 0.0, 0.0]);
    assert!(t.reverse_rotation().is_none());
    assert_eq!(mesh.coupling(1).unwrap().transform().unwrap().separation(), [-4.0, 0.0, 0.0]);

    let rows = mesh.coupling(1).unwrap().rows().unwrap();
    assert_eq!(rows.address[0], vec![0]);
    assert_close(rows.weights_sum[0], 1.0, 1e-12);
}

#[test]
fn transform_kinds_must_agree() {
    let err = BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 1, 1, false, PatchDict::coupled("right").with_rotation(Z, O, None)),
        radial_patch("right", 30.0, 1, 1, true, PatchDict::coupled("left").with_translation([1.0, 0.0, 0.0])),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        MeshAmiError::TransformKindMismatch {
            ours: TransformKind::Rotational,
            theirs: TransformKind::Translational,
            ..
        }
    ));
}

#[test]
fn incomplete_transform_declarations_are_fatal() {
    let err = BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 1, 1, false, PatchDict::coupled("right").with_rotation(O, O, None)),
        radial_patch("right", 30.0, 1, 1, true, PatchDict::coupled("left").with_rotation(Z, O, None)),
    ])
    .unwrap_err();
    assert_eq!(err, MeshAmiError::DegenerateRotationAxis { patch: "left".into() });

    let mut no_axis = PatchDict::coupled("left");
    no_axis.transform = TransformKind::Rotational;
    let err = BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 1, 1, false, PatchDict::coupled("right").with_rotation(Z, O, None)),
        radial_patch("right", 30.0, 1, 1, true, no_axis),
    ])
    .unwrap_err();
    assert_eq!(err, MeshAmiError::MissingRotationAxis { patch: "right".into() });

    let mut no_separation = PatchDict::coupled("outlet");
    no_separation.transform = TransformKind::Translational;
    let err = BoundaryMesh::new(vec![
        x_plane_patch("inlet", 0.0, false, no_separation),
        x_plane_patch("outlet", 4.0, true, PatchDict::coupled("inlet").with_translation([-4.0, 0.0, 0.0])),
    ])
    .unwrap_err();
    assert_eq!(err, MeshAmiError::MissingSeparation { patch: "inlet".into() });

    let err = BoundaryMesh::new(vec![x_plane_patch(
        "inlet",
        0.0,
        false,
        PatchDict::wall().with_translation([1.0, 0.0, 0.0]),
    )])
    .unwrap_err();
    assert!(matches!(err, MeshAmiError::MissingNeighbourSpec { key: "transform", .. }));
}

#[test]
fn written_dictionaries_reproduce_the_transform() {
    let mut mesh = sector(None);
    mesh.update_couplings(&NoComm).unwrap();
    let before = mesh.coupling(0).unwrap().transform().unwrap();

    let dicts: Vec<PatchDict> = (0..2)
        .map(|p| {
            let json = serde_json::to_string(&mesh.write_dict(p).unwrap()).unwrap();
            serde_json::from_str(&json).unwrap()
        })
        .collect();
    assert_close(dicts[0].rotation_angle.unwrap(), 30.0, 1e-9);
    assert_close(dicts[1].rotation_angle.unwrap(), -30.0, 1e-9);
    assert_eq!(dicts[0].rotation_axis, Some(Z));

    let mut restarted = BoundaryMesh::new(vec![
        radial_patch("left", 0.0, 3, 2, false, dicts[0].clone()),
        radial_patch("right", 30.0, 3, 2, true, dicts[1].clone()),
    ])
    .unwrap();
    restarted.update_couplings(&NoComm).unwrap();
    let after = restarted.coupling(0).unwrap().transform().unwrap();
    assert!(after.reverse.approx_eq(&before.reverse, 1e-12));
}

#[test]
fn faceless_rotational_pair_stays_unresolved() {
    let mut mesh = BoundaryMesh::new(vec![
        empty_patch("left", PatchDict::coupled("right").with_rotation(Z, O, None)),
        empty_patch("right", PatchDict::coupled("left").with_rotation(Z, O, None)),
    ])
    .unwrap();
    mesh.update_couplings(&NoComm).unwrap();
    let t = mesh.coupling(0).unwrap().transform().unwrap();
    assert!(!t.resolved);
    assert_eq!(mesh.write_dict(0).unwrap().rotation_angle, None);
}
