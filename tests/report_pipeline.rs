//! End-to-end report pipeline: dynamic tables in, pivoted display table out.

use cohort_metrics::{
    Cell, CovariateData, ReportOptions, Table, Table1Specification, build_report,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

fn source_tables() -> (Table, Table, Table, Table, Table) {
    let mut covariates = Table::new(columns(&[
        "cohortId",
        "covariateId",
        "timeId",
        "sumValue",
        "averageValue",
    ]));
    covariates.push_row(vec![
        Cell::Int(1),
        Cell::Int(8_532_001),
        Cell::Int(1),
        Cell::Float(120.0),
        Cell::Float(0.48),
    ]);
    covariates.push_row(vec![
        Cell::Int(1),
        Cell::Int(4_401_002),
        Cell::Int(2),
        Cell::Float(30.0),
        Cell::Float(0.12),
    ]);

    let mut continuous = Table::new(columns(&[
        "cohortId",
        "covariateId",
        "countValue",
        "minValue",
        "maxValue",
        "averageValue",
        "standardDeviation",
        "medianValue",
        "p10Value",
        "p25Value",
        "p75Value",
        "p90Value",
    ]));
    continuous.push_row(vec![
        Cell::Int(1),
        Cell::Int(1_002_003),
        Cell::Float(250.0),
        Cell::Float(18.0),
        Cell::Float(90.0),
        Cell::Float(54.3),
        Cell::Float(14.2),
        Cell::Float(55.0),
        Cell::Float(35.0),
        Cell::Float(44.0),
        Cell::Float(65.0),
        Cell::Float(73.0),
    ]);

    let mut covariate_ref = Table::new(columns(&[
        "covariateId",
        "covariateName",
        "analysisId",
        "conceptId",
    ]));
    covariate_ref.push_row(vec![
        Cell::Int(8_532_001),
        Cell::Str("gender = FEMALE".to_string()),
        Cell::Int(1),
        Cell::Int(8532),
    ]);
    covariate_ref.push_row(vec![
        Cell::Int(4_401_002),
        Cell::Str("heart failure".to_string()),
        Cell::Int(2),
        Cell::Int(0),
    ]);
    covariate_ref.push_row(vec![
        Cell::Int(1_002_003),
        Cell::Str("age in years".to_string()),
        Cell::Int(3),
        Cell::Int(0),
    ]);

    let mut analysis_ref = Table::new(columns(&[
        "analysisId",
        "analysisName",
        "domainId",
        "isBinary",
    ]));
    analysis_ref.push_row(vec![
        Cell::Int(1),
        Cell::Str("DemographicsGender".to_string()),
        Cell::Str("Demographics".to_string()),
        Cell::Int(1),
    ]);
    analysis_ref.push_row(vec![
        Cell::Int(2),
        Cell::Str("ConditionGroupEraLongTerm".to_string()),
        Cell::Str("Condition".to_string()),
        Cell::Int(1),
    ]);
    analysis_ref.push_row(vec![
        Cell::Int(3),
        Cell::Str("DemographicsAge".to_string()),
        Cell::Str("Demographics".to_string()),
        Cell::Int(0),
    ]);

    let mut time_ref = Table::new(columns(&["timeId", "startDay", "endDay"]));
    time_ref.push_row(vec![Cell::Int(1), Cell::Int(-30), Cell::Int(0)]);
    time_ref.push_row(vec![Cell::Int(2), Cell::Int(-365), Cell::Int(0)]);

    (covariates, continuous, covariate_ref, analysis_ref, time_ref)
}

#[test]
fn tables_to_pivoted_report() {
    init_logging();
    let (covariates, continuous, covariate_ref, analysis_ref, time_ref) = source_tables();
    let data = CovariateData::from_tables(
        &covariates,
        &continuous,
        &covariate_ref,
        &analysis_ref,
        Some(&time_ref),
    )
    .unwrap();

    let options = ReportOptions {
        cohort_name: Some("Heart failure target".to_string()),
        ..ReportOptions::default()
    };
    let report = build_report(&data, 1, &options).unwrap().unwrap();

    // Binary rows keep the count-percent format, continuous rows one decimal
    assert!(report.raw.iter().any(|r| r.formatted == "120 (48.0%)"));
    assert!(report.raw.iter().any(|r| r.formatted == "54.3"));
    // Synthetic cohort covariate recovered its concept id
    assert!(
        report
            .raw
            .iter()
            .any(|r| r.covariate_id == 4_401_002 && r.concept_id == 4401)
    );

    // Window columns sorted by (start, end), non-time-varying last, with the
    // display header row on top
    assert_eq!(
        report.formatted.columns(),
        &[
            "covariateId".to_string(),
            "covariateName".to_string(),
            "d-365d0".to_string(),
            "d-30d0".to_string(),
            "nonTimeVarying".to_string(),
        ]
    );
    assert_eq!(
        report.formatted.rows()[0][0],
        Cell::Str("cohortName".to_string())
    );
}

#[test]
fn grouped_report_carries_labels() {
    init_logging();
    let (covariates, continuous, covariate_ref, analysis_ref, time_ref) = source_tables();
    let data = CovariateData::from_tables(
        &covariates,
        &continuous,
        &covariate_ref,
        &analysis_ref,
        Some(&time_ref),
    )
    .unwrap();

    let options = ReportOptions {
        table1_specifications: Some(vec![
            Table1Specification {
                label: "Demographics".to_string(),
                analysis_id: 1,
                covariate_ids: "8532001,1002003".to_string(),
            },
            Table1Specification {
                label: "Conditions".to_string(),
                analysis_id: 2,
                covariate_ids: "4401002".to_string(),
            },
        ]),
        ..ReportOptions::default()
    };
    let report = build_report(&data, 1, &options).unwrap().unwrap();

    assert_eq!(report.formatted.columns()[0], "label");
    let labels: Vec<&str> = report
        .raw
        .iter()
        .filter(|r| r.covariate_id == 0)
        .map(|r| r.covariate_name.as_str())
        .collect();
    assert_eq!(labels, ["Demographics", "Conditions"]);
}
