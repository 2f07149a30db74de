use std::collections::{BTreeSet, HashMap};

use crate::error::{ProcessingError, Result};
use crate::models::{Pollutant, StationDirectory, StationLookup};

/// What the user picked once the wizard completes.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardSelection {
    pub station: String,
    pub pollutant: Pollutant,
    pub n_days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    Region,
    Department {
        region: String,
    },
    City {
        region: String,
        department: String,
    },
    Station {
        region: String,
        department: String,
        city: String,
    },
    Pollutant {
        region: String,
        department: String,
        city: String,
        station: String,
    },
    Window {
        region: String,
        department: String,
        city: String,
        station: String,
        pollutant: Pollutant,
    },
    Done(WizardSelection),
    Quit,
}

impl WizardState {
    pub fn is_finished(&self) -> bool {
        matches!(self, WizardState::Done(_) | WizardState::Quit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardInput {
    Number(u32),
    Back,
    Quit,
    /// Empty line: accept the default where the step has one
    Default,
}

impl WizardInput {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim().to_lowercase();
        match line.as_str() {
            "" => Some(WizardInput::Default),
            "b" | "back" | "retour" => Some(WizardInput::Back),
            "q" | "quit" | "exit" => Some(WizardInput::Quit),
            other => other.parse().ok().map(WizardInput::Number),
        }
    }
}

/// Guided station and window selection over the directory hierarchy.
pub struct Wizard<'a> {
    directory: &'a StationDirectory,
    capacity: u32,
    observed: HashMap<String, BTreeSet<Pollutant>>,
}

impl<'a> Wizard<'a> {
    pub fn new(directory: &'a StationDirectory, capacity: u32) -> Self {
        Self {
            directory,
            capacity,
            observed: HashMap::new(),
        }
    }

    /// Pollutants seen in the store, offered for stations the directory lists none for.
    pub fn with_observed_pollutants(mut self, observed: HashMap<String, BTreeSet<Pollutant>>) -> Self {
        self.observed = observed;
        self
    }

    pub fn pollutants(&self, station: &str) -> Vec<Pollutant> {
        let monitored = self.directory.monitored_pollutants(station);
        if !monitored.is_empty() {
            return monitored.into_iter().collect();
        }
        self.observed
            .get(station)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn prompt(&self, state: &WizardState) -> String {
        match state {
            WizardState::Region => "Choose a region".to_string(),
            WizardState::Department { region } => format!("Choose a department in {}", region),
            WizardState::City { department, .. } => format!("Choose a city in {}", department),
            WizardState::Station { city, .. } => format!("Choose a station in {}", city),
            WizardState::Pollutant { station, .. } => format!("Choose a pollutant for {}", station),
            WizardState::Window { .. } => format!(
                "Number of days to average (1-{}, empty for {})",
                self.capacity, self.capacity
            ),
            WizardState::Done(_) | WizardState::Quit => String::new(),
        }
    }

    /// Numbered choices for the current step, empty where free input is expected.
    pub fn options(&self, state: &WizardState) -> Vec<String> {
        match state {
            WizardState::Region => to_owned(self.directory.regions()),
            WizardState::Department { region } => to_owned(self.directory.departments(region)),
            WizardState::City { region, department } => {
                to_owned(self.directory.cities(region, department))
            }
            WizardState::Station {
                region,
                department,
                city,
            } => self
                .directory
                .stations(region, department, city)
                .into_iter()
                .map(|s| s.label())
                .collect(),
            WizardState::Pollutant { station, .. } => self
                .pollutants(station)
                .into_iter()
                .map(|p| format!("{} ({})", p.display_name(), p.code()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn transition(&self, state: &WizardState, input: WizardInput) -> Result<WizardState> {
        if input == WizardInput::Quit {
            return Ok(WizardState::Quit);
        }
        if input == WizardInput::Back {
            return Ok(self.back(state));
        }

        let next = match state {
            WizardState::Region => {
                let region = pick(self.directory.regions(), input)?;
                WizardState::Department {
                    region: region.to_string(),
                }
            }
            WizardState::Department { region } => {
                let department = pick(self.directory.departments(region), input)?;
                WizardState::City {
                    region: region.clone(),
                    department: department.to_string(),
                }
            }
            WizardState::City { region, department } => {
                let city = pick(self.directory.cities(region, department), input)?;
                WizardState::Station {
                    region: region.clone(),
                    department: department.clone(),
                    city: city.to_string(),
                }
            }
            WizardState::Station {
                region,
                department,
                city,
            } => {
                let station = pick(self.directory.stations(region, department, city), input)?;
                WizardState::Pollutant {
                    region: region.clone(),
                    department: department.clone(),
                    city: city.clone(),
                    station: station.code.clone(),
                }
            }
            WizardState::Pollutant {
                region,
                department,
                city,
                station,
            } => {
                let pollutant = pick(self.pollutants(station), input)?;
                WizardState::Window {
                    region: region.clone(),
                    department: department.clone(),
                    city: city.clone(),
                    station: station.clone(),
                    pollutant,
                }
            }
            WizardState::Window {
                station, pollutant, ..
            } => {
                let n_days = match input {
                    WizardInput::Default => self.capacity,
                    WizardInput::Number(n) if (1..=self.capacity).contains(&n) => n,
                    _ => {
                        return Err(ProcessingError::InvalidWindow {
                            n_days: match input {
                                WizardInput::Number(n) => n,
                                _ => 0,
                            },
                            capacity: self.capacity,
                        })
                    }
                };
                WizardState::Done(WizardSelection {
                    station: station.clone(),
                    pollutant: *pollutant,
                    n_days,
                })
            }
            WizardState::Done(_) | WizardState::Quit => state.clone(),
        };
        Ok(next)
    }

    fn back(&self, state: &WizardState) -> WizardState {
        match state.clone() {
            WizardState::Region | WizardState::Department { .. } => WizardState::Region,
            WizardState::City { region, .. } => WizardState::Department { region },
            WizardState::Station {
                region, department, ..
            } => WizardState::City { region, department },
            WizardState::Pollutant {
                region,
                department,
                city,
                ..
            } => WizardState::Station {
                region,
                department,
                city,
            },
            WizardState::Window {
                region,
                department,
                city,
                station,
                ..
            } => WizardState::Pollutant {
                region,
                department,
                city,
                station,
            },
            finished => finished,
        }
    }
}

fn to_owned(items: Vec<&str>) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

fn pick<T>(items: Vec<T>, input: WizardInput) -> Result<T> {
    let count = items.len();
    match input {
        WizardInput::Number(n) if n >= 1 && (n as usize) <= count => items
            .into_iter()
            .nth(n as usize - 1)
            .ok_or_else(|| ProcessingError::InvalidFormat(format!("No choice {}", n))),
        _ => Err(ProcessingError::InvalidFormat(format!(
            "Enter a number between 1 and {}, 'b' to go back or 'q' to quit",
            count
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StationMetadata;

    fn directory() -> StationDirectory {
        StationDirectory::from_stations(vec![
            StationMetadata::new(
                "FR04143".to_string(),
                "Paris 18eme".to_string(),
                "urbaine".to_string(),
                "Paris".to_string(),
                "PARIS".to_string(),
                "ILE-DE-FRANCE".to_string(),
            )
            .with_pollutants(vec![Pollutant::NitrogenDioxide, Pollutant::Ozone]),
            StationMetadata::new(
                "FR38012".to_string(),
                "Pointe-a-Pitre".to_string(),
                "urbaine".to_string(),
                "Pointe-a-Pitre".to_string(),
                "GUADELOUPE".to_string(),
                "GUADELOUPE".to_string(),
            ),
        ])
    }

    fn run(wizard: &Wizard, inputs: &[&str]) -> Result<WizardState> {
        let mut state = WizardState::Region;
        for line in inputs {
            let input = WizardInput::parse(line).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("unparsable input {}", line))
            })?;
            state = wizard.transition(&state, input)?;
        }
        Ok(state)
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(WizardInput::parse(" 3 "), Some(WizardInput::Number(3)));
        assert_eq!(WizardInput::parse("B"), Some(WizardInput::Back));
        assert_eq!(WizardInput::parse(""), Some(WizardInput::Default));
        assert_eq!(WizardInput::parse("q"), Some(WizardInput::Quit));
        assert_eq!(WizardInput::parse("abc"), None);
    }

    #[test]
    fn test_overseas_stations_are_grouped() {
        let directory = directory();
        let wizard = Wizard::new(&directory, 45);
        assert_eq!(
            wizard.options(&WizardState::Region),
            vec!["ILE-DE-FRANCE".to_string(), "OUTRE-MER".to_string()]
        );
    }

    #[test]
    fn test_full_walk_with_default_window() -> Result<()> {
        let directory = directory();
        let wizard = Wizard::new(&directory, 45);

        let state = run(&wizard, &["1", "1", "1", "1", "2", ""])?;
        assert_eq!(
            state,
            WizardState::Done(WizardSelection {
                station: "FR04143".to_string(),
                pollutant: Pollutant::NitrogenDioxide,
                n_days: 45,
            })
        );
        Ok(())
    }

    #[test]
    fn test_back_returns_to_previous_step() -> Result<()> {
        let directory = directory();
        let wizard = Wizard::new(&directory, 45);

        let state = run(&wizard, &["1", "1", "b", "b", "2"])?;
        assert_eq!(
            state,
            WizardState::Department {
                region: "OUTRE-MER".to_string()
            }
        );
        assert!(!state.is_finished());
        Ok(())
    }

    #[test]
    fn test_shorter_window_and_bad_choices() -> Result<()> {
        let directory = directory();
        let wizard = Wizard::new(&directory, 45);

        assert!(run(&wizard, &["9"]).is_err());
        assert!(run(&wizard, &["1", "1", "1", "1", "1", "46"]).is_err());

        let state = run(&wizard, &["1", "1", "1", "1", "1", "7"])?;
        match state {
            WizardState::Done(selection) => {
                assert_eq!(selection.pollutant, Pollutant::Ozone);
                assert_eq!(selection.n_days, 7);
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(run(&wizard, &["1", "q"])?, WizardState::Quit);
        Ok(())
    }

    #[test]
    fn test_homonym_city_lists_only_its_own_stations() -> Result<()> {
        let saint_denis = |code: &str, department: &str, region: &str| {
            StationMetadata::new(
                code.to_string(),
                format!("Saint-Denis {}", code),
                "urbaine".to_string(),
                "Saint-Denis".to_string(),
                department.to_string(),
                region.to_string(),
            )
        };
        let directory = StationDirectory::from_stations(vec![
            saint_denis("FR04069", "SEINE-SAINT-DENIS", "ILE-DE-FRANCE"),
            saint_denis("FR39001", "LA REUNION", "LA REUNION"),
        ]);
        let wizard = Wizard::new(&directory, 45);

        let state = run(&wizard, &["1", "1", "1"])?;
        let options = wizard.options(&state);
        assert_eq!(options.len(), 1);
        assert!(options[0].ends_with("FR04069"));

        let state = run(&wizard, &["2", "1", "1"])?;
        let options = wizard.options(&state);
        assert_eq!(options.len(), 1);
        assert!(options[0].ends_with("FR39001"));
        Ok(())
    }

    #[test]
    fn test_observed_pollutants_fill_in_for_unlisted_station() {
        let directory = directory();
        let mut observed = HashMap::new();
        observed.insert("FR38012".to_string(), BTreeSet::from([Pollutant::Particles]));
        let wizard = Wizard::new(&directory, 45).with_observed_pollutants(observed);

        assert_eq!(wizard.pollutants("FR38012"), vec![Pollutant::Particles]);
        assert!(Wizard::new(&directory, 45).pollutants("FR38012").is_empty());
    }
}
