//! End-to-end index workloads over the in-memory store.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arbor_diskann::{
    create_index, open_index, param, DiskAnnIndex, DistanceMetric, IndexKey, IndexParams,
    KeyDescriptor, MemStore, Vector, VectorType,
};

fn build_index(dims: u64, configure: impl FnOnce(&mut IndexParams)) -> DiskAnnIndex<MemStore> {
    let mut store = MemStore::new();
    let mut params = IndexParams::new();
    params
        .put_u64(param::VECTOR_TYPE, u64::from(VectorType::Float32.tag()))
        .unwrap();
    params.put_u64(param::DIMS, dims).unwrap();
    configure(&mut params);
    create_index(&mut store, &KeyDescriptor::new(1).unwrap(), &mut params).unwrap();
    open_index(store).unwrap()
}

fn random_vector(rng: &mut StdRng, dims: usize) -> Vector {
    Vector::Float32((0..dims).map(|_| rng.gen_range(0.0..100.0)).collect())
}

#[test]
fn test_mixed_insert_delete_search_workload() {
    let mut index = build_index(2, |params| {
        params.put_u64(param::METRIC, 2).unwrap();
    });
    let mut rng = StdRng::seed_from_u64(42);

    let mut live: Vec<i64> = Vec::new();
    let mut next_key = 0i64;
    let mut inserted = 0;
    let mut deleted = 0;
    for i in 0..100 {
        if i % 4 < 3 {
            let key = IndexKey::from_rowid(next_key);
            index.insert(&key, &random_vector(&mut rng, 2)).unwrap();
            live.push(next_key);
            next_key += 1;
            inserted += 1;
        } else {
            let victim = live.remove(rng.gen_range(0..live.len()));
            assert!(index.delete(&IndexKey::from_rowid(victim)).unwrap());
            deleted += 1;
        }
    }
    assert_eq!(inserted, 75);
    assert_eq!(deleted, 25);
    assert_eq!(index.row_count().unwrap(), 50);

    let query = Vector::Float32(vec![1.0, 1.0]);
    let hits = index.search(&query, 10).unwrap();
    assert_eq!(hits.len(), 10);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
    // Asking for more rows than remain returns everything that is left.
    let hits = index.search(&query, 60).unwrap();
    assert_eq!(hits.len(), 50);
    for hit in &hits {
        let key = hit.key.as_rowid().unwrap();
        assert!(live.contains(&key), "hit on deleted key {key}");
    }

    index.clear().unwrap();
    assert_eq!(index.row_count().unwrap(), 0);
    assert_eq!(index.search(&query, 10).unwrap().len(), 0);
}

#[test]
fn test_search_matches_brute_force() {
    // With a search list at least as large as the graph the traversal visits
    // every reachable node, so results must be the exact nearest neighbors.
    let mut index = build_index(4, |params| {
        params.put_u64(param::METRIC, 2).unwrap();
        params.put_u64(param::SEARCH_L, 512).unwrap();
    });
    let mut rng = StdRng::seed_from_u64(7);

    let mut rows: Vec<(i64, Vector)> = Vec::new();
    for key in 0..40i64 {
        let vector = random_vector(&mut rng, 4);
        index.insert(&IndexKey::from_rowid(key), &vector).unwrap();
        rows.push((key, vector));
    }

    for _ in 0..5 {
        let query = random_vector(&mut rng, 4);
        let mut expected: Vec<(i64, f64)> = rows
            .iter()
            .map(|(key, vector)| {
                (
                    *key,
                    arbor_diskann::distance(&query, vector, DistanceMetric::L2).unwrap(),
                )
            })
            .collect();
        expected.sort_by(|a, b| a.1.total_cmp(&b.1));

        let hits = index.search(&query, 5).unwrap();
        assert_eq!(hits.len(), 5);
        for (hit, (key, distance)) in hits.iter().zip(&expected) {
            assert_eq!(hit.key.as_rowid().unwrap(), *key);
            assert!((hit.distance - distance).abs() < 1e-4);
        }
    }
}

#[test]
fn test_compressed_neighbors_search() {
    // 1-bit edge copies under the cosine metric: candidate ordering is
    // approximate but visited nodes are re-ranked by exact distance, so with
    // an oversized search list the top hit must be the exact best match.
    let mut index = build_index(16, |params| {
        params
            .put_u64(param::COMPRESS_NEIGHBORS, u64::from(VectorType::Bit1.tag()))
            .unwrap();
        params.put_u64(param::SEARCH_L, 512).unwrap();
    });
    let mut rng = StdRng::seed_from_u64(3);

    let mut rows: Vec<(i64, Vector)> = Vec::new();
    for key in 0..30i64 {
        let vector = Vector::Float32((0..16).map(|_| rng.gen_range(-1.0..1.0)).collect());
        index.insert(&IndexKey::from_rowid(key), &vector).unwrap();
        rows.push((key, vector));
    }

    let (probe_key, probe_vector) = rows[17].clone();
    let hits = index.search(&probe_vector, 3).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].key.as_rowid().unwrap(), probe_key);
    assert!(hits[0].distance < 1e-6);
}

#[test]
fn test_float8_index_round_trip() {
    let mut index = build_index(8, |params| {
        // Override the auto-selected node encoding with quantized storage.
        params
            .put_u64(param::VECTOR_TYPE, u64::from(VectorType::Float8.tag()))
            .unwrap();
        params.put_u64(param::METRIC, 2).unwrap();
        params.put_u64(param::SEARCH_L, 256).unwrap();
    });

    for key in 0..10i64 {
        let float: Vec<f32> = (0..8).map(|d| (key * 8 + d) as f32 * 0.1).collect();
        let vector = Vector::Float32(float).convert_to(VectorType::Float8);
        index.insert(&IndexKey::from_rowid(key), &vector).unwrap();
    }
    let probe = Vector::Float32((0..8).map(|d| (3 * 8 + d) as f32 * 0.1).collect::<Vec<_>>())
        .convert_to(VectorType::Float8);
    let hits = index.search(&probe, 3).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].key.as_rowid().unwrap(), 3);
}

#[test]
fn test_delete_missing_key_is_noop() {
    let mut index = build_index(2, |_| {});
    assert!(!index.delete(&IndexKey::from_rowid(1)).unwrap());
    index
        .insert(&IndexKey::from_rowid(1), &Vector::Float32(vec![1.0, 2.0]))
        .unwrap();
    assert!(index.delete(&IndexKey::from_rowid(1)).unwrap());
    assert!(!index.delete(&IndexKey::from_rowid(1)).unwrap());
    assert_eq!(index.row_count().unwrap(), 0);
}

#[test]
fn test_insert_all_delete_all() {
    let mut index = build_index(2, |params| {
        params.put_u64(param::METRIC, 2).unwrap();
    });
    let mut rng = StdRng::seed_from_u64(11);
    for key in 0..20i64 {
        index
            .insert(&IndexKey::from_rowid(key), &random_vector(&mut rng, 2))
            .unwrap();
    }
    for key in 0..20i64 {
        assert!(index.delete(&IndexKey::from_rowid(key)).unwrap());
    }
    assert_eq!(index.row_count().unwrap(), 0);
    let hits = index.search(&Vector::Float32(vec![0.0, 0.0]), 5).unwrap();
    assert_eq!(hits.len(), 0);

    // The graph accepts new rows after being emptied row by row.
    index
        .insert(&IndexKey::from_rowid(100), &Vector::Float32(vec![1.0, 1.0]))
        .unwrap();
    assert_eq!(index.search(&Vector::Float32(vec![1.0, 1.0]), 1).unwrap().len(), 1);
}

#[test]
fn test_reopen_preserves_graph() {
    let mut index = build_index(2, |params| {
        params.put_u64(param::METRIC, 2).unwrap();
    });
    let mut rng = StdRng::seed_from_u64(5);
    for key in 0..15i64 {
        index
            .insert(&IndexKey::from_rowid(key), &random_vector(&mut rng, 2))
            .unwrap();
    }
    let probe = random_vector(&mut rng, 2);
    let before = index.search(&probe, 15).unwrap();
    assert_eq!(before.len(), 15);

    // Reopen from the persisted parameters and blocks alone.
    let store = index.into_store();
    let mut reopened = open_index(store).unwrap();
    let after = reopened.search(&probe, 15).unwrap();
    assert_eq!(after.len(), 15);
    let keys = |hits: &[arbor_diskann::SearchResult]| {
        let mut k: Vec<i64> = hits.iter().map(|h| h.key.as_rowid().unwrap()).collect();
        k.sort_unstable();
        k
    };
    assert_eq!(keys(&before), keys(&after));
}

#[test]
fn test_composite_keys() {
    use arbor_diskann::KeyValue;

    let mut store = MemStore::new();
    let mut params = IndexParams::new();
    params
        .put_u64(param::VECTOR_TYPE, u64::from(VectorType::Float32.tag()))
        .unwrap();
    params.put_u64(param::DIMS, 2).unwrap();
    params.put_u64(param::METRIC, 2).unwrap();
    create_index(&mut store, &KeyDescriptor::new(2).unwrap(), &mut params).unwrap();
    let mut index = open_index(store).unwrap();

    let key = |tenant: i64, name: &str| {
        IndexKey::new(vec![KeyValue::Integer(tenant), KeyValue::Text(name.into())]).unwrap()
    };
    index
        .insert(&key(1, "a"), &Vector::Float32(vec![0.0, 0.0]))
        .unwrap();
    index
        .insert(&key(1, "b"), &Vector::Float32(vec![1.0, 0.0]))
        .unwrap();
    index
        .insert(&key(2, "a"), &Vector::Float32(vec![0.0, 1.0]))
        .unwrap();

    let hits = index.search(&Vector::Float32(vec![0.1, 0.0]), 1).unwrap();
    assert_eq!(hits[0].key, key(1, "a"));

    assert!(index.delete(&key(1, "a")).unwrap());
    let hits = index.search(&Vector::Float32(vec![0.1, 0.0]), 3).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.key != key(1, "a")));
}
