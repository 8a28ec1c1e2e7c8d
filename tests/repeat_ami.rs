mod util;
use util::*;

use mesh_ami::algs::communicator::{Communicator, LocalComm, NoComm};
use mesh_ami::coupling::repeat::agree_transform_patch;
use mesh_ami::coupling::{CouplingKind, RepeatState};
use mesh_ami::data::dict::{CouplingSettings, PatchDict};
use mesh_ami::geometry::transform::RigidTransform;
use mesh_ami::mesh_error::MeshAmiError;
use mesh_ami::topology::boundary::BoundaryMesh;
use mesh_ami::topology::patch::Patch;

const Z: [f64; 3] = [0.0, 0.0, 1.0];
const O: [f64; 3] = [0.0, 0.0, 0.0];

fn repeat_dict(neighbour: &str) -> PatchDict {
    PatchDict::coupled(neighbour).with_transform_patch("p")
}

/// Translational transform patch pair `p`/`q`, 4 apart along x.
fn translation_pair() -> [Patch; 2] {
    [
        x_plane_patch("p", 0.0, false, PatchDict::coupled("q").with_translation([4.0, 0.0, 0.0])),
        x_plane_patch("q", 4.0, true, PatchDict::coupled("p").with_translation([-4.0, 0.0, 0.0])),
    ]
}

/// Rotational transform patch pair `p`/`q` bounding the sector [0, 30] deg.
fn rotation_pair() -> [Patch; 2] {
    [
        radial_patch("p", 0.0, 2, 1, false, PatchDict::coupled("q").with_rotation(Z, O, Some(30.0))),
        radial_patch("q", 30.0, 2, 1, true, PatchDict::coupled("p").with_rotation(Z, O, Some(30.0))),
    ]
}

fn translational_family(n: i32) -> BoundaryMesh {
    let [p, q] = translation_pair();
    BoundaryMesh::new(vec![
        strip("a", 4, 0.0, true, repeat_dict("b")),
        strip("b", 4, 4.0 * n as f64, false, repeat_dict("a")),
        p,
        q,
    ])
    .unwrap()
}

fn sector(name: &str, from_deg: f64, up: bool, dict: PatchDict) -> Patch {
    annulus_patch(name, 2, 4, [1.0, 2.0], [from_deg, from_deg + 30.0], up, dict)
}

fn rotational_family(b_from_deg: f64) -> BoundaryMesh {
    let [p, q] = rotation_pair();
    BoundaryMesh::new(vec![
        sector("a", 0.0, true, repeat_dict("b")),
        sector("b", b_from_deg, false, repeat_dict("a")),
        p,
        q,
    ])
    .unwrap()
}

fn repeat_state(mesh: &BoundaryMesh) -> RepeatState {
    mesh.coupling(0).unwrap().repeat().unwrap().unwrap().clone()
}

#[test]
fn translational_repeat_count_is_found() {
    for n in -2..=3 {
        let mut mesh = translational_family(n);
        assert_eq!(mesh.update_couplings(&NoComm).unwrap(), 2);
        assert!(matches!(
            mesh.interfaces()[0].kind(),
            CouplingKind::Periodic { transform_patch: 2 }
        ));

        let state = repeat_state(&mesh);
        assert_eq!(state.n(), n, "repeat count for n = {n}");
        assert_eq!(state.retained_n(), [n, n - 1]);
        let scores = state.scores();
        assert_close(scores[1], 1.0, 1e-12);
        assert_close(scores[0], 0.0, 1e-12);
        assert_close(scores[2], 0.0, 1e-12);
        assert!(state.candidates()[1].approx_eq(&RigidTransform::translation([4.0 * n as f64, 0.0, 0.0]), 1e-12));

        for patch in 0..2 {
            let sums = mesh.coupling(patch).unwrap().weights_sum().unwrap().to_vec();
            assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-12));
        }

        let donor = [1.0, 2.0, 3.0, 4.0];
        let values = mesh.coupling(0).unwrap().interpolate(&donor, None).unwrap();
        for (v, d) in values.iter().zip(donor) {
            assert_close(*v, d, 1e-12);
        }
    }
}

#[test]
fn rotational_repeat_count_is_found() {
    for n in -2..=3 {
        let mut mesh = rotational_family(30.0 * n as f64);
        mesh.update_couplings(&NoComm).unwrap();
        let state = repeat_state(&mesh);
        assert_eq!(state.n(), n, "repeat count for n = {n}");
        assert!(state.base().rotation.is_some());
        assert_close(state.scores()[1], 1.0, 1e-9);

        let sums = mesh.coupling(0).unwrap().weights_sum().unwrap().to_vec();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-9));
    }
}

#[test]
fn straddling_neighbour_keeps_both_adjacent_candidates() {
    for n in -1..=2 {
        let mut mesh = rotational_family(30.0 * n as f64 + 15.0);
        mesh.update_couplings(&NoComm).unwrap();
        let state = repeat_state(&mesh);

        let mut retained = state.retained_n();
        retained.sort();
        assert_eq!(retained, [n, n + 1], "straddle at n = {n}");

        // each face is fully covered by one of the two retained candidates
        for patch in 0..2 {
            let coupling = mesh.coupling(patch).unwrap();
            let sums = coupling.weights_sum().unwrap();
            assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-9), "{sums:?}");
            let values = coupling.interpolate(&[1.0; 8], None).unwrap();
            assert!(values.iter().all(|v| (v - 1.0).abs() < 1e-9));
        }
    }
}

#[test]
fn capped_walk_still_builds() {
    let [p, q] = translation_pair();
    let settings = CouplingSettings {
        max_repeat_walk: 1,
        ..CouplingSettings::default()
    };
    let mut mesh = BoundaryMesh::with_settings(
        vec![
            strip("a", 4, 0.0, true, repeat_dict("b")),
            strip("b", 4, 12.0, false, repeat_dict("a")),
            p,
            q,
        ],
        settings,
    )
    .unwrap();
    mesh.update_couplings(&NoComm).unwrap();
    assert_eq!(repeat_state(&mesh).n(), 1);
}

#[test]
fn transform_patch_changes_invalidate_the_repeat_pair() {
    let mut mesh = translational_family(1);
    mesh.update_couplings(&NoComm).unwrap();
    let points = mesh.patch(3).unwrap().points().to_vec();
    mesh.move_points(3, points).unwrap();
    assert_eq!(mesh.update_couplings(&NoComm).unwrap(), 2);
}

#[test]
fn repeat_pair_has_no_single_weight_table() {
    let mut mesh = translational_family(1);
    mesh.update_couplings(&NoComm).unwrap();
    assert!(matches!(
        mesh.coupling(0).unwrap().rows(),
        Err(MeshAmiError::InvalidGeometry(_))
    ));
    assert!(mesh.coupling(2).unwrap().repeat().unwrap().is_none());
}

#[test]
fn emptied_transform_patch_is_reported() {
    let mut mesh = BoundaryMesh::new(vec![
        strip("a", 4, 0.0, true, repeat_dict("b")),
        strip("b", 4, 4.0, false, repeat_dict("a")),
        empty_patch("p", PatchDict::coupled("q").with_translation([4.0, 0.0, 0.0])),
        empty_patch("q", PatchDict::coupled("p").with_translation([-4.0, 0.0, 0.0])),
    ])
    .unwrap();
    let err = mesh.update_couplings(&NoComm).unwrap_err();
    assert_eq!(
        err,
        MeshAmiError::EmptyTransformPatch {
            patch: "a".into(),
            transform_patch: "p".into(),
        }
    );
    assert!(err.to_string().contains("decomposition"));
}

#[test]
fn transform_patch_held_by_one_rank_is_shared() {
    let results = run_ranks(2, |comm: LocalComm| {
        let [p, q] = translation_pair();
        let (p, q) = if comm.rank() == 0 {
            (p, q)
        } else {
            (empty_patch("p", p.dict().clone()), empty_patch("q", q.dict().clone()))
        };
        let a = strip("a", 4, 0.0, true, repeat_dict("b"));
        let b = strip("b", 4, 8.0, false, repeat_dict("a"));
        let (a, b) = if comm.rank() == 0 {
            (a.select_faces(&[0, 1]).unwrap(), b.select_faces(&[3]).unwrap())
        } else {
            (a.select_faces(&[2, 3]).unwrap(), b.select_faces(&[0, 1, 2]).unwrap())
        };
        let mut mesh = BoundaryMesh::new(vec![a, b, p, q]).unwrap();
        mesh.update_couplings(&comm).unwrap();
        repeat_state(&mesh).n()
    });
    assert_eq!(results, vec![2, 2]);
}

#[test]
fn ranks_must_agree_on_the_transform_patch() {
    let results = run_ranks(2, |comm: LocalComm| {
        let local = RigidTransform::translation([4.0 + comm.rank() as f64, 0.0, 0.0]);
        agree_transform_patch(&comm, "a", "p", Some(local), 1e-8)
    });
    for r in results {
        assert_eq!(
            r.unwrap_err(),
            MeshAmiError::NonUniformTransformPatch {
                patch: "a".into(),
                transform_patch: "p".into(),
                first_rank: 0,
                other_rank: 1,
            }
        );
    }
}

#[test]
fn transform_patch_must_be_usable() {
    let build = |a_dict: PatchDict, b_dict: PatchDict, p_dict: PatchDict| {
        BoundaryMesh::new(vec![
            strip("a", 1, 0.0, true, a_dict),
            strip("b", 1, 4.0, false, b_dict),
            x_plane_patch("p", 0.0, false, p_dict),
            x_plane_patch("q", 4.0, true, PatchDict::coupled("p").with_translation([-4.0, 0.0, 0.0])),
        ])
        .unwrap_err()
    };
    let p_ok = || PatchDict::coupled("q").with_translation([4.0, 0.0, 0.0]);

    let err = build(repeat_dict("b"), PatchDict::coupled("a").with_transform_patch("q"), p_ok());
    assert!(matches!(err, MeshAmiError::TransformPatchMismatch { .. }));

    let err = build(repeat_dict("b"), PatchDict::coupled("a"), p_ok());
    assert!(matches!(err, MeshAmiError::CouplingKindMismatch { kind: "repeat-AMI", .. }));

    let self_ref = || PatchDict::coupled("b").with_transform_patch("a");
    let err = build(self_ref(), PatchDict::coupled("a").with_transform_patch("a"), p_ok());
    assert!(matches!(
        err,
        MeshAmiError::InvalidTransformPatch { reason: "is one of the repeat pair itself", .. }
    ));

    // only `q` declares the translation
    let err = build(repeat_dict("b"), repeat_dict("a"), PatchDict::coupled("q"));
    assert!(matches!(err, MeshAmiError::TransformKindMismatch { .. }));

    let err = build(
        repeat_dict("b").with_translation([4.0, 0.0, 0.0]),
        repeat_dict("a").with_translation([-4.0, 0.0, 0.0]),
        p_ok(),
    );
    assert!(matches!(
        err,
        MeshAmiError::ConflictingKeys { first: "transformPatch", second: "transform", .. }
    ));
}

#[test]
fn uncoupled_transform_patch_is_rejected() {
    let err = BoundaryMesh::new(vec![
        strip("a", 1, 0.0, true, repeat_dict("b")),
        strip("b", 1, 4.0, false, repeat_dict("a")),
        x_plane_patch("p", 0.0, false, PatchDict::wall()),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        MeshAmiError::InvalidTransformPatch { reason: "is not a coupled patch", .. }
    ));

    let err = BoundaryMesh::new(vec![
        strip("a", 1, 0.0, true, repeat_dict("b")),
        strip("b", 1, 4.0, false, repeat_dict("a")),
        x_plane_patch("p", 0.0, false, PatchDict::coupled("q")),
        x_plane_patch("q", 4.0, true, PatchDict::coupled("p")),
    ])
    .unwrap_err();
    assert!(matches!(
        err,
        MeshAmiError::InvalidTransformPatch { reason: "declares no transform", .. }
    ));
}
