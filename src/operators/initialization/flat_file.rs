//! Initialization from delimited flat files.
//!
//! One design per line:
//! `v0<D>v1…v_{NDV-1}[<D>o0…o_{NOF-1}<D>c0…c_{NCN-1}]`.  Lines with fewer
//! than NDV fields are discarded with a warning; lines carrying the full
//! response row produce designs flagged `Evaluated`; any other field
//! count of at least NDV produces unevaluated designs.
//!
//! When no delimiter is configured, autodetection tries tab, then comma,
//! then a whitespace run, and the first candidate producing a consistent
//! column count across the file wins.

use std::collections::BTreeSet;

use crate::design::{Design, DesignGroup, DesignTarget};
use crate::error::{ConfigError, Error, handle_failure};
use crate::operators::initialization::{DEFAULT_SIZE, RandomUniqueInitializer};
use crate::operators::{GeneticOperator, Initializer, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

#[derive(Debug, Clone, PartialEq)]
enum Delimiter {
    Pattern(String),
    WhitespaceRun,
}

impl Delimiter {
    fn split(&self, line: &str) -> Vec<String> {
        match self {
            Delimiter::Pattern(pat) => line.split(pat.as_str()).map(str::to_string).collect(),
            Delimiter::WhitespaceRun => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct ReadOutcome {
    designs: Vec<Design>,
    evaluated: usize,
    partial: usize,
    discarded: usize,
}

/// Reads one or more delimited design files, delegating any shortfall to
/// the random-unique initializer.
#[derive(Debug, Clone)]
pub struct FlatFileInitializer {
    size: usize,
    file_names: BTreeSet<String>,
    delimiter: Option<String>,
}

impl FlatFileInitializer {
    pub const NAME: &'static str = "flat_file";

    pub fn new() -> Self {
        Self {
            size: DEFAULT_SIZE,
            file_names: BTreeSet::new(),
            delimiter: None,
        }
    }

    /// Registers a file to read; repeats are ignored.
    pub fn add_file_name(&mut self, name: impl Into<String>) -> bool {
        self.file_names.insert(name.into())
    }

    /// Sets the field delimiter; an empty string requests autodetection.
    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        let delimiter = delimiter.into();
        if delimiter.is_empty() {
            log::warn!(
                "{}: empty delimiter supplied; automatic delimiter discovery \
                 will be employed",
                Self::NAME
            );
            self.delimiter = None;
        } else {
            log::info!("{}: delimiter now = {delimiter:?}", Self::NAME);
            self.delimiter = Some(delimiter);
        }
    }

    /// Picks the delimiter for `lines`: the configured one, or the first
    /// of tab, comma, whitespace-run that yields a consistent column
    /// count.
    fn resolve_delimiter(&self, lines: &[&str], file: &str) -> Result<Delimiter, Error> {
        if let Some(pat) = &self.delimiter {
            return Ok(Delimiter::Pattern(pat.clone()));
        }
        let candidates = [
            Delimiter::Pattern("\t".to_string()),
            Delimiter::Pattern(",".to_string()),
            Delimiter::WhitespaceRun,
        ];
        for candidate in candidates {
            let mut counts = lines.iter().map(|l| candidate.split(l).len());
            if let Some(first) = counts.next() {
                if first > 0 && counts.all(|c| c == first) {
                    log::info!("{}: auto-detected delimiter {candidate:?}", Self::NAME);
                    return Ok(candidate);
                }
            }
        }
        Err(handle_failure(Error::Config(ConfigError::CannotParse {
            file: file.to_string(),
            reason: "no candidate delimiter yields a consistent column count".to_string(),
        })))
    }

    fn read_file(&self, file: &str, target: &DesignTarget) -> Result<ReadOutcome, Error> {
        let contents = std::fs::read_to_string(file)?;
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let mut outcome = ReadOutcome::default();
        if lines.is_empty() {
            return Ok(outcome);
        }

        let delimiter = self.resolve_delimiter(&lines, file)?;
        let (ndv, nof, ncn) = (target.ndv(), target.nof(), target.ncn());
        let full_width = ndv + nof + ncn;

        for line in lines {
            let fields = delimiter.split(line);
            let numbers: Option<Vec<f64>> =
                fields.iter().map(|f| f.trim().parse::<f64>().ok()).collect();
            let Some(numbers) = numbers else {
                log::warn!("{}: discarding unparseable line {line:?}", Self::NAME);
                outcome.discarded += 1;
                continue;
            };
            if numbers.len() < ndv {
                log::warn!(
                    "{}: discarding line with {} of {ndv} required variable fields",
                    Self::NAME,
                    numbers.len()
                );
                outcome.discarded += 1;
                continue;
            }

            let mut design = target.new_design();
            for (dv, info) in target.variable_infos().iter().enumerate() {
                let value = numbers[dv];
                let rep = info.value_to_rep(value).unwrap_or_else(|| {
                    log::warn!(
                        "{}: value {value} is not legal for variable \
                         \"{}\"; using the nearest legal representation",
                        Self::NAME,
                        info.label()
                    );
                    info.nearest_valid_rep(value)
                });
                design.set_variable(dv, rep);
            }
            design.set_satisfies_bounds(true);

            if numbers.len() == full_width && nof + ncn > 0 {
                for of in 0..nof {
                    design.set_objective(of, numbers[ndv + of]);
                }
                for cn in 0..ncn {
                    design.set_constraint(cn, numbers[ndv + nof + cn]);
                }
                design.set_evaluated(true);
                target.check_feasibility(&mut design);
                outcome.evaluated += 1;
            } else {
                outcome.partial += 1;
            }
            outcome.designs.push(design);
        }
        Ok(outcome)
    }
}

impl Default for FlatFileInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for FlatFileInitializer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Initializer
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let size = db.get_size("method.population_size")?;
        log_poll(self.name(), "method.population_size", &size);
        if let Some(size) = size {
            self.size = size;
        }

        let delimiter = db.get_str("method.jega.initializer_delimiter")?;
        log_poll(self.name(), "method.jega.initializer_delimiter", &delimiter);
        if let Some(delimiter) = delimiter {
            self.set_delimiter(delimiter);
        }

        let single = db.get_str("method.flat_file")?;
        log_poll(self.name(), "method.flat_file", &single);
        if let Some(file) = single {
            self.add_file_name(file);
        }
        let many = db.get_str_vec("method.flat_files")?;
        log_poll(self.name(), "method.flat_files", &many);
        if let Some(files) = many {
            for file in files {
                if !self.add_file_name(file.clone()) {
                    log::warn!(
                        "{}: filename {file:?} found more than once; \
                         repetitions ignored",
                        self.name()
                    );
                }
            }
        }
        Ok(())
    }
}

impl Initializer for FlatFileInitializer {
    fn clone_operator(&self) -> Box<dyn Initializer> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    fn initialize(
        &mut self,
        into: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: performing initialization", self.name());

        if self.file_names.is_empty() {
            return Err(handle_failure(Error::Config(ConfigError::EmptyFileSet)));
        }

        for file in &self.file_names {
            let outcome = match self.read_file(file, target) {
                Ok(outcome) => outcome,
                Err(Error::Io(e)) => {
                    log::warn!(
                        "{}: could not read {file:?} ({e}); make sure the file \
                         exists and is a design flat file",
                        self.name()
                    );
                    continue;
                }
                Err(other) => return Err(other),
            };
            log::info!(
                "{}: {file:?}: {} evaluated, {} unevaluated, {} discarded",
                self.name(),
                outcome.evaluated,
                outcome.partial,
                outcome.discarded
            );
            for design in outcome.designs {
                if into.contains_variables(design.variables()) {
                    log::warn!(
                        "{}: duplicate design in initialization files ignored",
                        self.name()
                    );
                    target.take_design(design);
                } else {
                    into.insert(design);
                }
            }
        }

        if into.is_empty() {
            log::warn!(
                "{}: no designs were read from initialization files; all \
                 initial designs will be generated by the random unique \
                 initializer",
                self.name()
            );
        }

        if into.len() < self.size {
            log::info!(
                "{}: the desired number of designs were not found in the \
                 supplied file(s); using the random unique initializer to \
                 generate the remaining designs",
                self.name()
            );
            let mut fallback = RandomUniqueInitializer::new();
            fallback.set_size(self.size - into.len());
            fallback.initialize(into, target, rng)?;
        }

        if into.len() < 2 {
            return Err(handle_failure(Error::Config(ConfigError::Invalid(
                "unable to generate a minimum of 2 initial designs even with \
                 the help of the random unique initializer"
                    .to_string(),
            ))));
        }

        log::info!(
            "{}: final initial population size: {}",
            self.name(),
            into.len()
        );
        self.size = into.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::{ConstraintInfo, ObjectiveInfo};
    use crate::design::variable::VariableInfo;
    use crate::random::StdRandomGenerator;
    use std::io::Write;

    fn target_2v_1o_1c() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 10.0, 4))
            .add_variable(VariableInfo::continuum_real("y", 0.0, 10.0, 4))
            .add_objective(ObjectiveInfo::minimize("f"))
            .add_constraint(ConstraintInfo::upper_bounded("g", 0.0));
        target
    }

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    fn initializer_for(file: &tempfile::NamedTempFile) -> FlatFileInitializer {
        let mut initializer = FlatFileInitializer::new();
        initializer.add_file_name(file.path().to_string_lossy().to_string());
        initializer
    }

    #[test]
    fn test_full_rows_are_marked_evaluated() {
        let target = target_2v_1o_1c();
        let file = write_temp("1.0\t2.0\t5.0\t-1.0\n3.0\t4.0\t25.0\t-0.5\n");
        let mut initializer = initializer_for(&file);
        initializer.set_size(2);
        let mut group = DesignGroup::new();
        let mut rng = StdRandomGenerator::new_from_seed(Some(5));
        initializer
            .initialize(&mut group, &target, &mut rng)
            .unwrap();

        assert_eq!(group.len(), 2);
        for design in group.iter() {
            assert!(design.is_evaluated());
            assert!(design.is_feasible());
        }
    }

    #[test]
    fn test_variable_only_rows_stay_unevaluated() {
        let target = target_2v_1o_1c();
        let file = write_temp("1.0,2.0\n3.0,4.0\n5.0,6.0\n");
        let mut initializer = initializer_for(&file);
        initializer.set_size(3);
        let mut group = DesignGroup::new();
        let mut rng = StdRandomGenerator::new_from_seed(Some(5));
        initializer
            .initialize(&mut group, &target, &mut rng)
            .unwrap();

        assert_eq!(group.len(), 3);
        for design in group.iter() {
            assert!(!design.is_evaluated());
        }
    }

    #[test]
    fn test_short_lines_are_discarded_and_shortfall_delegated() {
        let target = target_2v_1o_1c();
        // One good line, one with a single field.
        let file = write_temp("1.0 2.0\n9.0\n");
        let mut initializer = initializer_for(&file);
        initializer.set_size(4);
        let mut group = DesignGroup::new();
        let mut rng = StdRandomGenerator::new_from_seed(Some(5));
        initializer
            .initialize(&mut group, &target, &mut rng)
            .unwrap();

        // 1 from the file + 3 random-unique fill-ins.
        assert_eq!(group.len(), 4);
    }

    #[test]
    fn test_autodetect_prefers_tab_over_comma() {
        let target = target_2v_1o_1c();
        // Tab-delimited with commas inside no field: tab parses to 2
        // consistent columns, so it wins before comma is tried.
        let file = write_temp("1.0\t2.0\n3.0\t4.0\n");
        let initializer = initializer_for(&file);
        let lines = ["1.0\t2.0", "3.0\t4.0"];
        let delimiter = initializer.resolve_delimiter(&lines, "test").unwrap();
        assert_eq!(delimiter, Delimiter::Pattern("\t".to_string()));
        drop(target);
    }

    #[test]
    fn test_empty_file_set_is_fatal() {
        let target = target_2v_1o_1c();
        let mut initializer = FlatFileInitializer::new();
        let mut group = DesignGroup::new();
        let mut rng = StdRandomGenerator::new_from_seed(Some(5));
        let err = initializer
            .initialize(&mut group, &target, &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EmptyFileSet)));
    }

    #[test]
    fn test_poll_merges_both_file_keys() {
        let target = target_2v_1o_1c();
        let mut db = ParameterDatabase::new();
        db.set_str("method.flat_file", "a.dat");
        db.set_str_vec(
            "method.flat_files",
            vec!["b.dat".to_string(), "a.dat".to_string()],
        );
        db.set_str("method.jega.initializer_delimiter", ",");
        let mut initializer = FlatFileInitializer::new();
        initializer.poll_for_parameters(&db, &target).unwrap();
        assert_eq!(initializer.file_names.len(), 2);
        assert_eq!(initializer.delimiter, Some(",".to_string()));
    }
}
