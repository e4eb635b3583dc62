use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{RitualError, RitualResult};
use crate::logging::{self, LogLevel};
use crate::process::{self, normalize_args, Arg};
use crate::rituals::Circle;
use crate::sandbox::Credentials;
use crate::{fs, hash, template};

use super::{collect_names, elements, ElementSpec};

/// Command-line arguments as written in a script.
///
/// `cast: make` runs a lone program; `cast: [make, -C, src]` and
/// `cast: [[make, -C, src]]` are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Args {
    Program(String),
    List(Vec<Arg<String>>),
}

impl Args {
    fn argv(&self, op: &'static str, circle: &Circle) -> RitualResult<Vec<String>> {
        let args = match self {
            Args::Program(program) => vec![Arg::One(program.clone())],
            Args::List(list) => list.clone(),
        };
        Ok(normalize_args(op, args)?
            .iter()
            .map(|arg| template::expand(arg, &circle.variables))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CharmStep {
    pub args: Args,
    /// Variable receiving the captured output; printed to stdout when absent.
    #[serde(default)]
    pub into: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvokeStep {
    pub rituals: Vec<ElementSpec>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyStep {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreprocessStep {
    pub from: String,
    pub to: String,
    /// Overlaid on the circle's variables for this render only.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HinderStep {
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvStep {
    /// Circle variable → environment variable to read into it. Unset
    /// environment variables remove the circle variable.
    #[serde(default)]
    pub get: BTreeMap<String, String>,
    #[serde(default)]
    pub set: BTreeMap<String, String>,
    #[serde(default)]
    pub unset: Vec<String>,
    #[serde(default)]
    pub clear: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountStep {
    pub source: String,
    pub target: String,
    #[serde(default = "default_fstype")]
    pub fstype: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub data: Option<String>,
}

fn default_fstype() -> String {
    "none".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashStep {
    pub path: String,
    pub into: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogStep {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    pub message: String,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PwdStep {
    pub into: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinStep {
    pub parts: Vec<String>,
    pub into: String,
}

/// Input and output of `dirname`/`basename`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathPartStep {
    pub path: String,
    pub into: String,
}

/// Status requested by `exit`: a code, a success flag or a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExitStatus {
    Code(i32),
    Flag(bool),
    Named(ExitName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitName {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Code(code) => code,
            ExitStatus::Flag(true) | ExitStatus::Named(ExitName::Success) => 0,
            ExitStatus::Flag(false) | ExitStatus::Named(ExitName::Failure) => 1,
        }
    }
}

/// One entry of a ritual's step list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Cast(Args),
    Charm(CharmStep),
    Invoke(InvokeStep),
    Incantation(Vec<ElementSpec>),
    Copy(CopyStep),
    Remove(Arg<String>),
    Preprocess(PreprocessStep),
    Hinder(HinderStep),
    Set(BTreeMap<String, String>),
    Env(EnvStep),
    Mkdirs(String),
    Chdir(String),
    Chroot(String),
    Mount(MountStep),
    Umount(String),
    Hash(HashStep),
    Log(LogStep),
    Pwd(PwdStep),
    Path(JoinStep),
    Dirname(PathPartStep),
    Basename(PathPartStep),
    /// `exit: ~` means success.
    Exit(Option<ExitStatus>),
}

impl Step {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Cast(_) => "cast",
            Step::Charm(_) => "charm",
            Step::Invoke(_) => "invoke",
            Step::Incantation(_) => "incantation",
            Step::Copy(_) => "copy",
            Step::Remove(_) => "remove",
            Step::Preprocess(_) => "preprocess",
            Step::Hinder(_) => "hinder",
            Step::Set(_) => "set",
            Step::Env(_) => "env",
            Step::Mkdirs(_) => "mkdirs",
            Step::Chdir(_) => "chdir",
            Step::Chroot(_) => "chroot",
            Step::Mount(_) => "mount",
            Step::Umount(_) => "umount",
            Step::Hash(_) => "hash",
            Step::Log(_) => "log",
            Step::Pwd(_) => "pwd",
            Step::Path(_) => "path",
            Step::Dirname(_) => "dirname",
            Step::Basename(_) => "basename",
            Step::Exit(_) => "exit",
        }
    }

    /// Run this step against `circle`.
    pub fn execute(&self, circle: &mut Circle) -> RitualResult<()> {
        let op = self.name();
        tracing::trace!(step = op, "executing step");

        match self {
            Step::Cast(args) => {
                let argv = args.argv(op, circle)?;
                process::cast(circle.report(), &argv)
            }
            Step::Charm(step) => {
                let argv = step.args.argv(op, circle)?;
                let output = process::charm(circle.report(), &argv)?;
                match &step.into {
                    Some(name) => {
                        let text = String::from_utf8(output).map_err(|_| {
                            RitualError::usage(
                                op,
                                format!(
                                    "output of '{}' is not valid UTF-8, cannot store it in '{name}'",
                                    argv.join(" ")
                                ),
                            )
                        })?;
                        circle.variables.insert(name.clone(), text);
                    }
                    None => {
                        let mut stdout = io::stdout().lock();
                        stdout
                            .write_all(&output)
                            .and_then(|()| stdout.write_all(b"\n"))
                            .map_err(|e| RitualError::io(op, "write", "<stdout>", e))?;
                    }
                }
                Ok(())
            }
            Step::Invoke(step) => {
                let incantation = circle.registry.build_incantation(elements(&step.rituals))?;
                let output = step.output.as_deref().map(|p| path(p, circle));
                process::invoke(circle, &incantation, output.as_deref())
            }
            Step::Incantation(specs) => circle.perform(elements(specs)),
            Step::Copy(step) => {
                let from = path(&step.from, circle);
                let to = path(&step.to, circle);
                circle.report().copy(&from, &to);
                fs::copy(&from, &to)
            }
            Step::Remove(paths) => {
                let paths: Vec<PathBuf> = normalize_args(op, vec![paths.clone()])?
                    .iter()
                    .map(|p| path(p, circle))
                    .collect();
                circle.report().remove(&paths);
                paths.iter().try_for_each(|p| fs::remove(p))
            }
            Step::Preprocess(step) => {
                let from = path(&step.from, circle);
                let to = path(&step.to, circle);
                let mut variables = circle.variables.clone();
                variables.extend(step.variables.clone());
                circle.report().preprocess(&from, &to);
                template::render(&from, &to, &variables)
            }
            Step::Hinder(step) => {
                Credentials::new(step.uid, step.gid).hinder()?;
                Ok(())
            }
            Step::Set(values) => {
                for (name, value) in values {
                    let value = template::expand(value, &circle.variables);
                    circle.variables.insert(name.clone(), value);
                }
                Ok(())
            }
            Step::Env(step) => {
                apply_env(step, circle);
                Ok(())
            }
            Step::Mkdirs(p) => fs::mkdirs(&path(p, circle)),
            Step::Chdir(p) => fs::chdir(&path(p, circle)),
            Step::Chroot(p) => fs::chroot(&path(p, circle)),
            Step::Mount(step) => {
                let source = template::expand(&step.source, &circle.variables);
                let target = path(&step.target, circle);
                fs::mount(&source, &target, &step.fstype, &step.flags, step.data.as_deref())
            }
            Step::Umount(p) => fs::umount(&path(p, circle)),
            Step::Hash(step) => {
                let digest = hash::sha256_file(&path(&step.path, circle))?;
                circle.variables.insert(step.into.clone(), digest);
                Ok(())
            }
            Step::Log(step) => {
                let message = template::expand(&step.message, &circle.variables);
                logging::emit(step.level, &message);
                Ok(())
            }
            Step::Pwd(step) => {
                let cwd = fs::pwd()?;
                circle.variables.insert(step.into.clone(), cwd.to_string_lossy().into_owned());
                Ok(())
            }
            Step::Path(step) => {
                let parts: Vec<String> =
                    step.parts.iter().map(|p| template::expand(p, &circle.variables)).collect();
                circle.variables.insert(step.into.clone(), fs::join_path(&parts));
                Ok(())
            }
            Step::Dirname(step) => {
                let value = fs::dirname(&template::expand(&step.path, &circle.variables));
                circle.variables.insert(step.into.clone(), value);
                Ok(())
            }
            Step::Basename(step) => {
                let value = fs::basename(&template::expand(&step.path, &circle.variables));
                circle.variables.insert(step.into.clone(), value);
                Ok(())
            }
            Step::Exit(status) => {
                Err(RitualError::Exit { code: status.map_or(0, ExitStatus::code) })
            }
        }
    }

    pub(super) fn collect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Step::Invoke(step) => collect_names(&step.rituals, names),
            Step::Incantation(specs) => collect_names(specs, names),
            _ => {}
        }
    }
}

fn path(raw: &str, circle: &Circle) -> PathBuf {
    PathBuf::from(template::expand(raw, &circle.variables))
}

/// Read `get`, then clear, unset and set, in that order.
fn apply_env(step: &EnvStep, circle: &mut Circle) {
    for (variable, name) in &step.get {
        match std::env::var(name) {
            Ok(value) => {
                circle.variables.insert(variable.clone(), value);
            }
            Err(_) => {
                circle.variables.remove(variable);
            }
        }
    }
    if step.clear {
        for (name, _) in std::env::vars_os() {
            std::env::remove_var(name);
        }
    }
    for name in &step.unset {
        std::env::remove_var(name);
    }
    for (name, value) in &step.set {
        std::env::set_var(name, template::expand(value, &circle.variables));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_steps(yaml: &str) -> Vec<Step> {
        let de = serde_yaml::Deserializer::from_str(yaml);
        serde_yaml::with::singleton_map_recursive::deserialize(de).unwrap()
    }

    #[test]
    fn cast_accepts_every_argument_shape() {
        let steps = parse_steps("- cast: echo\n- cast: [echo, hi]\n- cast: [[echo, hi]]\n");
        let circle = Circle::default();
        let argvs: Vec<Vec<String>> = steps
            .iter()
            .map(|s| match s {
                Step::Cast(args) => args.argv("cast", &circle).unwrap(),
                other => panic!("unexpected step {other:?}"),
            })
            .collect();
        assert_eq!(argvs[0], vec!["echo".to_string()]);
        assert_eq!(argvs[1], argvs[2]);
    }

    #[test]
    fn set_expands_against_existing_variables() {
        let mut circle = Circle::default();
        circle.variables.insert("ROOT".into(), "/srv".into());
        for step in parse_steps("- set: { DATA: \"@ROOT@/data\" }\n") {
            step.execute(&mut circle).unwrap();
        }
        assert_eq!(circle.variables["DATA"], "/srv/data");
    }

    #[test]
    fn exit_unwinds_with_code() {
        let steps = parse_steps("- exit: 3\n");
        let err = steps[0].execute(&mut Circle::default()).unwrap_err();
        assert!(matches!(err, RitualError::Exit { code: 3 }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn exit_accepts_flags_names_and_null() {
        let codes: Vec<i32> = parse_steps(
            "- exit: ~\n- exit: true\n- exit: false\n- exit: success\n- exit: failure\n- exit: 9\n",
        )
        .iter()
        .map(|step| step.execute(&mut Circle::default()).unwrap_err().exit_code())
        .collect();
        assert_eq!(codes, vec![0, 0, 1, 0, 1, 9]);
    }

    #[test]
    fn argv_keeps_literal_at_signs() {
        let steps = parse_steps("- cast: [ssh, \"deploy@@HOST@\", \"user@example.org\"]\n");
        let mut circle = Circle::default();
        circle.variables.insert("HOST".into(), "db1".into());
        match &steps[0] {
            Step::Cast(args) => assert_eq!(
                args.argv("cast", &circle).unwrap(),
                vec!["ssh".to_string(), "deploy@HOST@".to_string(), "user@example.org".to_string()]
            ),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn unknown_step_fields_are_rejected() {
        let de = serde_yaml::Deserializer::from_str("- copy: { from: a, to: b, mode: 1 }\n");
        let parsed: Result<Vec<Step>, _> =
            serde_yaml::with::singleton_map_recursive::deserialize(de);
        assert!(parsed.is_err());
    }
}
