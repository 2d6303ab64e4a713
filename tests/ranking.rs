//! Learning-to-rank end to end.

use distgbt::*;

mod common;
use common::*;

fn ranking_config(kind: ObjectiveKind) -> ConfigBuilder {
    ConfigBuilder::new()
        .objective(kind)
        .n_estimators(20)
        .min_child_weight(0.01)
}

#[test]
fn test_lambdarank_improves_ndcg() {
    let data = ranking_dataset(30, 10, 21);
    let config = ranking_config(ObjectiveKind::RankNdcg)
        .eval_metric(Metric::Map { k: None })
        .eval_metric(Metric::Ndcg { k: Some(5) })
        .build()
        .unwrap();
    let result = train(&config, &data, &[], TrainOptions::new()).unwrap();
    assert_eq!(result.model.base_score(), 0.0);

    let ndcg = result.history.get("train", "ndcg@5").unwrap();
    assert_eq!(ndcg.len(), 20);
    assert!(ndcg[19] >= ndcg[0]);
    assert!(ndcg[19] > 0.9);
    let map = result.history.get("train", "map").unwrap();
    assert!(map.iter().all(|m| (0.0..=1.0).contains(m)));
}

#[test]
fn test_pairwise_orders_documents_by_relevance() {
    let data = ranking_dataset(20, 8, 5);
    let config = ranking_config(ObjectiveKind::RankPairwise)
        .build()
        .unwrap();
    let result = train(&config, &data, &[], TrainOptions::new()).unwrap();
    let ndcg = result.history.get("train", "ndcg").unwrap();
    assert!(ndcg[19] > 0.9);

    let margins = result.model.predict(&data).unwrap();
    let labels = data.labels();
    let (mut agree, mut pairs) = (0usize, 0usize);
    for group in data.group_ptr().unwrap().windows(2) {
        for i in group[0]..group[1] {
            for j in group[0]..group[1] {
                if labels[i] > labels[j] {
                    pairs += 1;
                    agree += usize::from(margins[[0, i]] > margins[[0, j]]);
                }
            }
        }
    }
    assert!(agree as f64 > 0.9 * pairs as f64);
}

#[test]
fn test_ranking_without_groups_names_qid() {
    let data = regression_dataset(10, 2, 3);
    let config = ranking_config(ObjectiveKind::RankNdcg).build().unwrap();
    let err = train(&config, &data, &[], TrainOptions::new()).unwrap_err();
    assert!(err.to_string().contains("qid"));
}

#[test]
fn test_ranking_metric_requires_ranking_objective() {
    let config = ConfigBuilder::new()
        .eval_metric(Metric::Ndcg { k: Some(3) })
        .build();
    assert!(config.is_err());
}

#[test]
fn test_group_sizes_and_qid_agree() {
    let base = ranking_dataset(4, 5, 8);
    let x = match base.features() {
        FeatureMatrix::Dense(m) => m.clone(),
        FeatureMatrix::Sparse(_) => unreachable!(),
    };
    let by_sizes = Dataset::builder(x)
        .labels(base.labels().to_vec())
        .group_sizes(vec![5; 4])
        .build()
        .unwrap();
    assert_eq!(by_sizes.group_ptr(), base.group_ptr());

    let config = ranking_config(ObjectiveKind::RankNdcg)
        .n_estimators(3)
        .build()
        .unwrap();
    let a = train(&config, &base, &[], TrainOptions::new()).unwrap();
    let b = train(&config, &by_sizes, &[], TrainOptions::new()).unwrap();
    assert_eq!(a.model, b.model);
}
