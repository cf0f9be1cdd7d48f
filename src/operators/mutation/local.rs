//! Structure-aware local mutation driven by a design-space roadmap.
//!
//! The roadmap file describes the choice structure of the design space:
//! blocks of correlated variables (single- and multi-choice option
//! blocks), free variables, date-typed variables whose neighbours are
//! adjacent indices, and vertically paired blocks that must change
//! together.  Each mutation event picks one of five variants at random:
//!
//! 1. full-block-change — reassign a whole block consistently;
//! 2. block extension — grow a contiguous run of equal values by one;
//! 3. move-by-1 — step a variable's representation up or down one notch;
//! 4. random reassignment within the legal representations;
//! 5. vertical-pair full-block-change — the same change applied to two
//!    structurally paired spans.
//!
//! This mutator reads population members and places the mutated copies
//! into the offspring buffer.  Roadmap parsing is strict: an unknown
//! section header fails the run.
//!
//! ## Roadmap format
//!
//! ```text
//! # comment lines and blanks are ignored
//! [single-choice]
//! layout 0 3          # block name, first variable, last variable
//! [multi-choice]
//! payload 4 6
//! [variables]
//! 7 free
//! 8 date launch_window
//! [pairs]
//! 0 4 3               # paired spans starting at 0 and 4, length 3
//! ```

use std::collections::BTreeMap;

use crate::design::variable::VariableInfo;
use crate::design::{Design, DesignGroup, DesignTarget};
use crate::error::{ConfigError, Error, handle_failure};
use crate::operators::mutation::{DEFAULT_RATE, mutation_event_count};
use crate::operators::{GeneticOperator, Mutator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

#[derive(Debug, Clone)]
struct Block {
    name: String,
    lo: usize,
    hi: usize,
}

#[derive(Debug, Clone, Default)]
struct Roadmap {
    single_blocks: Vec<Block>,
    multi_blocks: Vec<Block>,
    free_vars: Vec<usize>,
    date_groups: BTreeMap<String, Vec<usize>>,
    pairs: Vec<(usize, usize, usize)>,
}

impl Roadmap {
    fn parse(contents: &str, file: &str) -> Result<Roadmap, Error> {
        #[derive(PartialEq)]
        enum Section {
            None,
            SingleChoice,
            MultiChoice,
            Variables,
            Pairs,
        }

        let bad_line = |line: &str| {
            Error::Config(ConfigError::CannotParse {
                file: file.to_string(),
                reason: format!("malformed roadmap line {line:?}"),
            })
        };

        let mut map = Roadmap::default();
        let mut section = Section::None;
        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') {
                section = match line {
                    "[single-choice]" => Section::SingleChoice,
                    "[multi-choice]" => Section::MultiChoice,
                    "[variables]" => Section::Variables,
                    "[pairs]" => Section::Pairs,
                    other => {
                        return Err(handle_failure(Error::Config(
                            ConfigError::UnknownRoadmapSection {
                                file: file.to_string(),
                                header: other.to_string(),
                            },
                        )));
                    }
                };
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            match section {
                Section::None => return Err(bad_line(line)),
                Section::SingleChoice | Section::MultiChoice => {
                    if fields.len() != 3 {
                        return Err(bad_line(line));
                    }
                    let lo: usize = fields[1].parse().map_err(|_| bad_line(line))?;
                    let hi: usize = fields[2].parse().map_err(|_| bad_line(line))?;
                    if lo > hi {
                        return Err(bad_line(line));
                    }
                    let block = Block {
                        name: fields[0].to_string(),
                        lo,
                        hi,
                    };
                    if section == Section::SingleChoice {
                        map.single_blocks.push(block);
                    } else {
                        map.multi_blocks.push(block);
                    }
                }
                Section::Variables => {
                    if fields.len() < 2 {
                        return Err(bad_line(line));
                    }
                    let dv: usize = fields[0].parse().map_err(|_| bad_line(line))?;
                    match fields[1] {
                        "free" => map.free_vars.push(dv),
                        "date" => {
                            let group = fields.get(2).ok_or_else(|| bad_line(line))?;
                            map.date_groups
                                .entry(group.to_string())
                                .or_default()
                                .push(dv);
                        }
                        _ => return Err(bad_line(line)),
                    }
                }
                Section::Pairs => {
                    if fields.len() != 3 {
                        return Err(bad_line(line));
                    }
                    let a: usize = fields[0].parse().map_err(|_| bad_line(line))?;
                    let b: usize = fields[1].parse().map_err(|_| bad_line(line))?;
                    let len: usize = fields[2].parse().map_err(|_| bad_line(line))?;
                    if len == 0 {
                        return Err(bad_line(line));
                    }
                    map.pairs.push((a, b, len));
                }
            }
        }
        Ok(map)
    }

    fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.single_blocks.iter().chain(self.multi_blocks.iter())
    }

    fn block_count(&self) -> usize {
        self.single_blocks.len() + self.multi_blocks.len()
    }

    fn highest_index(&self) -> Option<usize> {
        let block_hi = self.blocks().map(|b| b.hi).max();
        let var_hi = self.free_vars.iter().copied().max();
        let date_hi = self.date_groups.values().flatten().copied().max();
        let pair_hi = self.pairs.iter().map(|&(a, b, len)| a.max(b) + len - 1).max();
        [block_hi, var_hi, date_hi, pair_hi]
            .into_iter()
            .flatten()
            .max()
    }

    fn is_date_variable(&self, dv: usize) -> bool {
        self.date_groups.values().any(|dvs| dvs.contains(&dv))
    }
}

#[derive(Debug, Clone, Copy)]
enum Variant {
    FullBlockChange,
    BlockExtension,
    MoveByOne,
    RandomReassign,
    VerticalPair,
}

/// Roadmap-driven local mutator.
#[derive(Debug, Clone, Default)]
pub struct LocalDesignVariableMutator {
    rate: f64,
    roadmap: Roadmap,
}

impl LocalDesignVariableMutator {
    pub const NAME: &'static str = "local_design_variable";

    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            roadmap: Roadmap::default(),
        }
    }

    /// Parses and merges a roadmap file into this mutator, validating
    /// its indices against the target.
    pub fn read_design_space_file(
        &mut self,
        file: &str,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let contents = std::fs::read_to_string(file)?;
        let parsed = Roadmap::parse(&contents, file)?;
        if let Some(hi) = parsed.highest_index() {
            if hi >= target.ndv() {
                return Err(handle_failure(Error::Config(ConfigError::CannotParse {
                    file: file.to_string(),
                    reason: format!(
                        "roadmap references variable {hi} of a {} variable problem",
                        target.ndv()
                    ),
                })));
            }
        }
        self.roadmap.single_blocks.extend(parsed.single_blocks);
        self.roadmap.multi_blocks.extend(parsed.multi_blocks);
        self.roadmap.free_vars.extend(parsed.free_vars);
        for (group, dvs) in parsed.date_groups {
            self.roadmap.date_groups.entry(group).or_default().extend(dvs);
        }
        self.roadmap.pairs.extend(parsed.pairs);
        log::info!("{}: roadmap read from {file:?}", Self::NAME);
        Ok(())
    }

    fn applicable_variants(&self) -> Vec<Variant> {
        let mut variants = vec![Variant::MoveByOne, Variant::RandomReassign];
        if self.roadmap.block_count() > 0 {
            variants.push(Variant::FullBlockChange);
            variants.push(Variant::BlockExtension);
        }
        if !self.roadmap.pairs.is_empty() {
            variants.push(Variant::VerticalPair);
        }
        variants
    }

    fn pick_block<'a>(&'a self, rng: &mut dyn RandomGenerator) -> &'a Block {
        let idx = rng.gen_range_usize(0, self.roadmap.block_count());
        self.roadmap
            .blocks()
            .nth(idx)
            .expect("index drawn below the block count")
    }

    fn assign_span(design: &mut Design, infos: &[VariableInfo], lo: usize, hi: usize, rep: f64) {
        for dv in lo..=hi {
            design.set_variable(dv, infos[dv].nearest_valid_rep(rep));
        }
    }

    fn move_by_one(design: &mut Design, info: &VariableInfo, dv: usize, up: bool) {
        let step = 10f64.powi(-info.precision());
        let current = design.variable(dv);
        let stepped = if up { current + step } else { current - step };
        design.set_variable(dv, info.nearest_valid_rep(stepped));
    }

    fn apply_variant(
        &self,
        design: &mut Design,
        variant: Variant,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) {
        let infos = target.variable_infos();
        match variant {
            Variant::FullBlockChange => {
                let block = self.pick_block(rng);
                let rep = infos[block.lo].random_rep(rng);
                log::debug!(
                    "{}: full block change of \"{}\" to {rep}",
                    Self::NAME,
                    block.name
                );
                Self::assign_span(design, infos, block.lo, block.hi, rep);
            }
            Variant::BlockExtension => {
                let block = self.pick_block(rng);
                let dv = rng.gen_range_usize(block.lo, block.hi + 1);
                let value = design.variable(dv);
                // Bounds of the contiguous run of equal reps around dv.
                let mut run_lo = dv;
                while run_lo > block.lo && design.variable(run_lo - 1) == value {
                    run_lo -= 1;
                }
                let mut run_hi = dv;
                while run_hi < block.hi && design.variable(run_hi + 1) == value {
                    run_hi += 1;
                }
                let grow_left = run_lo > block.lo && (run_hi == block.hi || rng.gen_bool(0.5));
                if grow_left {
                    design.set_variable(run_lo - 1, value);
                } else if run_hi < block.hi {
                    design.set_variable(run_hi + 1, value);
                }
            }
            Variant::MoveByOne => {
                let dv = rng.gen_range_usize(0, infos.len());
                Self::move_by_one(design, &infos[dv], dv, rng.gen_bool(0.5));
            }
            Variant::RandomReassign => {
                let dv = rng.gen_range_usize(0, infos.len());
                // Date variables only ever step to a neighbouring date.
                if self.roadmap.is_date_variable(dv) {
                    Self::move_by_one(design, &infos[dv], dv, rng.gen_bool(0.5));
                } else {
                    let rep = infos[dv].random_rep(rng);
                    design.set_variable(dv, rep);
                }
            }
            Variant::VerticalPair => {
                let (a, b, len) =
                    self.roadmap.pairs[rng.gen_range_usize(0, self.roadmap.pairs.len())];
                let rep = infos[a].random_rep(rng);
                log::debug!(
                    "{}: vertical pair change of spans {a} and {b} to {rep}",
                    Self::NAME
                );
                Self::assign_span(design, infos, a, a + len - 1, rep);
                Self::assign_span(design, infos, b, b + len - 1, rep);
            }
        }
    }
}

impl GeneticOperator for LocalDesignVariableMutator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Mutator
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let rate = db.get_real("method.mutation_rate")?;
        log_poll(self.name(), "method.mutation_rate", &rate);
        if let Some(rate) = rate {
            self.rate = rate;
        }

        let single = db.get_str("method.jega.design_space_file")?;
        log_poll(self.name(), "method.jega.design_space_file", &single);
        if let Some(file) = single {
            self.read_design_space_file(&file, target)?;
        }
        let many = db.get_str_vec("method.jega.design_space_files")?;
        log_poll(self.name(), "method.jega.design_space_files", &many);
        if let Some(files) = many {
            for file in files {
                self.read_design_space_file(&file, target)?;
            }
        }
        Ok(())
    }
}

impl Mutator for LocalDesignVariableMutator {
    fn clone_operator(&self) -> Box<dyn Mutator> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn mutate(
        &mut self,
        population: &mut DesignGroup,
        children: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: performing mutation", self.name());

        let events = mutation_event_count(self.rate, population.len(), children.len());
        if events == 0 || population.is_empty() || target.ndv() == 0 {
            return Ok(());
        }

        let variants = self.applicable_variants();
        for _ in 0..events {
            let slot = rng.gen_range_usize(0, population.len());
            let variant = variants[rng.gen_range_usize(0, variants.len())];

            let mut mutated = target.new_design_from(population.get(slot));
            mutated.set_evaluated(false);
            self.apply_variant(&mut mutated, variant, target, rng);
            children.insert(mutated);
        }

        log::info!("{}: {events} mutations performed", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;
    use crate::random::StdRandomGenerator;

    fn target_5v() -> DesignTarget {
        let mut target = DesignTarget::new();
        for label in ["a", "b", "c", "d", "e"] {
            target.add_variable(VariableInfo::continuum_integer(label, 0, 9));
        }
        target.add_objective(ObjectiveInfo::minimize("f"));
        target
    }

    const ROADMAP: &str = "\
# layout options
[single-choice]
layout 0 2
[variables]
3 free
4 date window
[pairs]
0 3 2
";

    #[test]
    fn test_parse_accepts_known_sections() {
        let map = Roadmap::parse(ROADMAP, "test.map").unwrap();
        assert_eq!(map.single_blocks.len(), 1);
        assert_eq!(map.single_blocks[0].name, "layout");
        assert_eq!(map.free_vars, vec![3]);
        assert_eq!(map.date_groups["window"], vec![4]);
        assert_eq!(map.pairs, vec![(0, 3, 2)]);
        assert_eq!(map.highest_index(), Some(4));
    }

    #[test]
    fn test_unknown_section_header_is_fatal() {
        let err = Roadmap::parse("[wormholes]\n", "bad.map").unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnknownRoadmapSection { .. })
        ));
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let err = Roadmap::parse("[single-choice]\nonly_two_fields 3\n", "bad.map").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::CannotParse { .. })));
    }

    #[test]
    fn test_mutated_copies_land_in_children() {
        let target = target_5v();
        let mut population = DesignGroup::new();
        for i in 0..4 {
            let mut d = target.new_design();
            for dv in 0..5 {
                d.set_variable(dv, ((i + dv) % 10) as f64);
            }
            d.set_evaluated(true);
            population.insert(d);
        }
        let mut children = DesignGroup::new();

        let mut mutator = LocalDesignVariableMutator::new();
        mutator.roadmap = Roadmap::parse(ROADMAP, "test.map").unwrap();
        mutator.set_rate(1.0);
        let mut rng = StdRandomGenerator::new_from_seed(Some(27));
        mutator
            .mutate(&mut population, &mut children, &target, &mut rng)
            .unwrap();

        assert_eq!(children.len(), 4);
        assert_eq!(population.len(), 4);
        for child in children.iter() {
            assert!(!child.is_evaluated());
            for dv in 0..5 {
                assert!(
                    target.variable_infos()[dv].is_rep_in_bounds(child.variable(dv)),
                    "illegal rep after local mutation"
                );
            }
        }
        // Originals keep their evaluations.
        assert!(population.iter().all(|d| d.is_evaluated()));
    }

    #[test]
    fn test_full_block_change_is_consistent() {
        let target = target_5v();
        let mut mutator = LocalDesignVariableMutator::new();
        mutator.roadmap = Roadmap::parse("[single-choice]\nlayout 0 2\n", "m").unwrap();

        let mut design = target.new_design();
        for dv in 0..5 {
            design.set_variable(dv, dv as f64);
        }
        let mut rng = StdRandomGenerator::new_from_seed(Some(3));
        mutator.apply_variant(&mut design, Variant::FullBlockChange, &target, &mut rng);

        let first = design.variable(0);
        assert_eq!(design.variable(1), first);
        assert_eq!(design.variable(2), first);
        // Variables outside the block are untouched.
        assert_eq!(design.variable(3), 3.0);
        assert_eq!(design.variable(4), 4.0);
    }

    #[test]
    fn test_move_by_one_steps_a_notch() {
        let info = VariableInfo::continuum_integer("n", 0, 9);
        let target = target_5v();
        let mut design = target.new_design();
        design.set_variable(0, 5.0);
        LocalDesignVariableMutator::move_by_one(&mut design, &info, 0, true);
        assert_eq!(design.variable(0), 6.0);
        LocalDesignVariableMutator::move_by_one(&mut design, &info, 0, false);
        assert_eq!(design.variable(0), 5.0);

        // Clamped at the bounds.
        design.set_variable(0, 9.0);
        LocalDesignVariableMutator::move_by_one(&mut design, &info, 0, true);
        assert_eq!(design.variable(0), 9.0);
    }
}
