use viable::Error;
use viable::estimators::{
    allelic_richness, detect_bottleneck, effective_population_size, hardy_weinberg,
    harmonic_mean_size, inbreeding_coefficients,
};
use viable::params::{
    AllelicRichnessInput, BottleneckInput, EffectivePopulationInput, GenotypeCount,
    HardyWeinbergInput, InbreedingInput, SeverityBands,
};
use viable::summary::{BottleneckSeverity, InbreedingLevel};

fn ne(breeding_males: u64, breeding_females: u64) -> f64 {
    effective_population_size(&EffectivePopulationInput {
        breeding_males,
        breeding_females,
    })
    .expect("failed to compute effective size")
    .effective_population_size
}

#[test]
fn effective_size_from_sex_ratio() {
    assert!((ne(25, 30) - 54.545).abs() < 0.01);
    assert!((ne(25, 25) - 50.0).abs() < 1e-12);
    assert!(ne(1, 100) < 4.0);
}

#[test]
fn effective_size_is_symmetric() {
    for (males, females) in [(1, 2), (25, 30), (7, 1000), (3, 3)] {
        assert_eq!(ne(males, females), ne(females, males));
    }
}

#[test]
fn effective_size_reports_census_ratio() {
    let result = effective_population_size(&EffectivePopulationInput {
        breeding_males: 10,
        breeding_females: 30,
    })
    .expect("failed to compute effective size");
    assert_eq!(result.census_size, 40);
    assert!((result.ne_ratio - 30.0 / 40.0).abs() < 1e-12);
}

#[test]
fn effective_size_rejects_missing_sex() {
    let result = effective_population_size(&EffectivePopulationInput {
        breeding_males: 0,
        breeding_females: 10,
    });
    assert!(matches!(result, Err(Error::Domain(_))));
}

fn bottleneck(sizes: &[f64]) -> viable::estimators::BottleneckResult {
    detect_bottleneck(
        &BottleneckInput {
            sizes: sizes.to_vec(),
        },
        &SeverityBands::default(),
    )
    .expect("failed to detect bottleneck")
}

#[test]
fn synthetic_dip_is_detected() {
    let result = bottleneck(&[1000.0, 900.0, 50.0, 100.0, 200.0, 400.0]);
    assert!(result.bottleneck_detected);
    assert_eq!(result.minimum_size, 50.0);
    assert_eq!(result.minimum_index, 2);
    assert_eq!(result.peak_size, 1000.0);
    assert!((result.reduction_percentage - 95.0).abs() < 1e-12);
    assert_eq!(result.severity, BottleneckSeverity::Severe);
    // 8-fold growth over 3 generations projects 18-fold in 5.
    assert_eq!(result.recovery_generations, Some(5));
    assert!(!result.recovery_observed);
    assert!(result.effective_population_size > 50.0);
    assert!(result.effective_population_size < 441.0);
}

#[test]
fn observed_recovery_is_counted_from_the_minimum() {
    let result = bottleneck(&[1000.0, 100.0, 500.0, 950.0]);
    assert_eq!(result.severity, BottleneckSeverity::Severe);
    assert_eq!(result.recovery_generations, Some(2));
    assert!(result.recovery_observed);
}

#[test]
fn reference_peak_precedes_the_minimum() {
    let result = bottleneck(&[500.0, 1000.0, 800.0, 300.0, 2000.0]);
    assert_eq!(result.peak_size, 1000.0);
    assert!((result.reduction_percentage - 70.0).abs() < 1e-12);
    assert_eq!(result.severity, BottleneckSeverity::Mild);
    assert_eq!(result.recovery_generations, Some(1));
}

#[test]
fn shallow_decline_is_not_a_bottleneck() {
    let result = bottleneck(&[100.0, 90.0, 80.0]);
    assert!(!result.bottleneck_detected);
    assert_eq!(result.severity, BottleneckSeverity::None);
    assert_eq!(result.recovery_generations, None);
}

#[test]
fn severity_bands_are_configurable() {
    let bands = SeverityBands {
        mild: 10.0,
        moderate: 15.0,
        severe: 19.0,
    };
    let result = detect_bottleneck(
        &BottleneckInput {
            sizes: vec![100.0, 90.0, 80.0],
        },
        &bands,
    )
    .expect("failed to detect bottleneck");
    assert_eq!(result.severity, BottleneckSeverity::Severe);
}

#[test]
fn bottleneck_rejects_bad_series() {
    let bands = SeverityBands::default();
    let short = BottleneckInput { sizes: vec![10.0] };
    assert!(matches!(
        detect_bottleneck(&short, &bands),
        Err(Error::Structural(_))
    ));
    let zero = BottleneckInput {
        sizes: vec![10.0, 0.0, 5.0],
    };
    assert!(matches!(
        detect_bottleneck(&zero, &bands),
        Err(Error::Domain(_))
    ));
    assert!(matches!(harmonic_mean_size(&[]), Err(Error::Domain(_))));
}

#[test]
fn rarefaction_to_smallest_sample_keeps_observed_richness() {
    let result = allelic_richness(&AllelicRichnessInput {
        allele_counts: vec![5, 8, 3],
        sample_sizes: vec![20, 40, 20],
        rarefaction_size: None,
    })
    .expect("failed to compute allelic richness");

    assert_eq!(result.rarefaction_size, 20);
    assert_eq!(result.rarefied_richness[0], 5.0);
    assert_eq!(result.rarefied_richness[2], 3.0);
    assert!(result.rarefied_richness[1] < 8.0);
    assert!(result.rarefied_richness[1] > 3.0);
    let mean = result.rarefied_richness.iter().sum::<f64>() / 3.0;
    assert!((result.mean_richness - mean).abs() < 1e-12);
}

#[test]
fn rarefied_richness_grows_with_reference_size() {
    let mut prev = 0.0;
    for size in [1, 5, 10, 20, 40] {
        let result = allelic_richness(&AllelicRichnessInput {
            allele_counts: vec![8],
            sample_sizes: vec![40],
            rarefaction_size: Some(size),
        })
        .expect("failed to compute allelic richness");
        assert!(result.rarefied_richness[0] > prev);
        prev = result.rarefied_richness[0];
    }
    assert_eq!(prev, 8.0);
}

#[test]
fn expected_heterozygosity_of_even_alleles() {
    let result = allelic_richness(&AllelicRichnessInput {
        allele_counts: vec![4, 1],
        sample_sizes: vec![20, 20],
        rarefaction_size: None,
    })
    .expect("failed to compute allelic richness");
    assert!((result.expected_heterozygosity[0] - 0.75).abs() < 1e-12);
    assert_eq!(result.expected_heterozygosity[1], 0.0);
    assert!((result.mean_heterozygosity - 0.375).abs() < 1e-12);
}

#[test]
fn allelic_richness_rejects_bad_input() {
    let mismatched = AllelicRichnessInput {
        allele_counts: vec![3, 4],
        sample_sizes: vec![10],
        rarefaction_size: None,
    };
    assert!(matches!(
        allelic_richness(&mismatched),
        Err(Error::Structural(_))
    ));

    let zero = AllelicRichnessInput {
        allele_counts: vec![0],
        sample_sizes: vec![10],
        rarefaction_size: None,
    };
    assert!(matches!(allelic_richness(&zero), Err(Error::Domain(_))));

    let too_many = AllelicRichnessInput {
        allele_counts: vec![12],
        sample_sizes: vec![10],
        rarefaction_size: None,
    };
    assert!(matches!(allelic_richness(&too_many), Err(Error::Domain(_))));

    let too_large = AllelicRichnessInput {
        allele_counts: vec![3, 4],
        sample_sizes: vec![10, 20],
        rarefaction_size: Some(15),
    };
    assert!(matches!(allelic_richness(&too_large), Err(Error::Domain(_))));
}

#[test]
fn f_statistics() {
    let result = inbreeding_coefficients(&InbreedingInput {
        subpopulation_heterozygosity: vec![0.4, 0.5],
        observed_heterozygosity: 0.3,
        expected_heterozygosity: 0.6,
    })
    .expect("failed to compute F-statistics");
    assert!((result.fis - 1.0 / 3.0).abs() < 1e-12);
    assert!((result.fst - 0.25).abs() < 1e-12);
    assert!((result.fit - 0.5).abs() < 1e-12);
    assert_eq!(result.interpretation, InbreedingLevel::High);
}

#[test]
fn f_statistics_reject_zero_heterozygosity() {
    let result = inbreeding_coefficients(&InbreedingInput {
        subpopulation_heterozygosity: vec![],
        observed_heterozygosity: 0.0,
        expected_heterozygosity: 0.5,
    });
    assert!(matches!(result, Err(Error::Domain(_))));
}

fn genotypes(counts: &[(&str, &str, u64)]) -> HardyWeinbergInput {
    HardyWeinbergInput {
        genotypes: counts
            .iter()
            .map(|&(a, b, count)| GenotypeCount {
                alleles: [a.to_string(), b.to_string()],
                count,
            })
            .collect(),
        significance: 0.05,
    }
}

#[test]
fn hardy_weinberg_proportions_are_in_equilibrium() {
    let result = hardy_weinberg(&genotypes(&[("A", "A", 25), ("A", "B", 50), ("B", "B", 25)]))
        .expect("failed to run hardy-weinberg test");
    assert_eq!(result.individuals, 100);
    assert_eq!(result.degrees_of_freedom, 1);
    assert_eq!(result.allele_frequencies["A"], 0.5);
    assert_eq!(result.expected_genotypes["A/B"], 50.0);
    assert!(result.chi_square.abs() < 1e-12);
    assert!((result.p_value - 1.0).abs() < 1e-9);
    assert!(result.in_equilibrium);
}

#[test]
fn missing_heterozygotes_break_equilibrium() {
    let result = hardy_weinberg(&genotypes(&[("A", "A", 50), ("B", "B", 50)]))
        .expect("failed to run hardy-weinberg test");
    assert_eq!(result.expected_genotypes["A/A"], 25.0);
    assert_eq!(result.expected_genotypes["A/B"], 50.0);
    assert!((result.chi_square - 100.0).abs() < 1e-9);
    assert!(result.p_value < 1e-6);
    assert!(!result.in_equilibrium);
}

#[test]
fn genotype_allele_order_is_irrelevant() {
    let forward = hardy_weinberg(&genotypes(&[("A", "A", 30), ("A", "B", 40), ("B", "B", 30)]))
        .expect("failed to run hardy-weinberg test");
    let split = hardy_weinberg(&genotypes(&[
        ("A", "A", 30),
        ("B", "A", 15),
        ("A", "B", 25),
        ("B", "B", 30),
    ]))
    .expect("failed to run hardy-weinberg test");
    assert_eq!(forward, split);
    assert_eq!(split.observed_genotypes["A/B"], 40);
}

#[test]
fn three_alleles_have_three_degrees_of_freedom() {
    let result = hardy_weinberg(&genotypes(&[
        ("A", "A", 10),
        ("A", "B", 20),
        ("B", "C", 20),
        ("C", "C", 10),
    ]))
    .expect("failed to run hardy-weinberg test");
    assert_eq!(result.degrees_of_freedom, 3);
    assert_eq!(result.expected_genotypes.len(), 6);
    let total: f64 = result.expected_genotypes.values().sum();
    assert!((total - 60.0).abs() < 1e-9);
    assert!((0.0..=1.0).contains(&result.p_value));
}

#[test]
fn hardy_weinberg_rejects_bad_input() {
    let monomorphic = genotypes(&[("A", "A", 40), ("A", "B", 0)]);
    assert!(matches!(hardy_weinberg(&monomorphic), Err(Error::Domain(_))));

    let nobody = genotypes(&[("A", "A", 0), ("A", "B", 0)]);
    assert!(matches!(hardy_weinberg(&nobody), Err(Error::Domain(_))));

    let empty = genotypes(&[]);
    assert!(matches!(hardy_weinberg(&empty), Err(Error::Structural(_))));

    let unnamed = genotypes(&[("A", "", 3), ("A", "B", 4)]);
    assert!(matches!(hardy_weinberg(&unnamed), Err(Error::Structural(_))));
}
