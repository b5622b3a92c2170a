//! Matchup feature vectors for the regression models
//!
//! A matchup is encoded from the home team's home summary and the away team's
//! away summary.

use crate::features::TeamFeatureSummary;

/// Which columns a regression model sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureLayout {
    /// Every summary field for both teams
    Full,
    /// Scoring level, shooting and trend only
    Reduced,
}

impl FeatureLayout {
    /// Dimension of the feature vector
    pub fn dim(&self) -> usize {
        match self {
            FeatureLayout::Full => 16,
            FeatureLayout::Reduced => 9,
        }
    }

    /// Build the vector; `None` if any value is not finite
    pub fn build(&self, home: &TeamFeatureSummary, away: &TeamFeatureSummary) -> Option<Vec<f64>> {
        let v = match self {
            FeatureLayout::Full => {
                let mut v = full_team_columns(home);
                v.extend(full_team_columns(away));
                v
            }
            FeatureLayout::Reduced => vec![
                home.avg_points,
                home.recent_points,
                home.fg_pct,
                home.trend,
                away.avg_points,
                away.recent_points,
                away.fg_pct,
                away.trend,
                home.home_advantage - away.home_advantage,
            ],
        };

        debug_assert_eq!(v.len(), self.dim());
        if v.iter().all(|x| x.is_finite()) {
            Some(v)
        } else {
            None
        }
    }

    /// Column names, for logging fitted models
    pub fn column_names(&self) -> Vec<String> {
        let team = |side: &str, cols: &[&str]| -> Vec<String> {
            cols.iter().map(|c| format!("{}_{}", side, c)).collect()
        };
        match self {
            FeatureLayout::Full => {
                let cols = [
                    "avg_points",
                    "recent_points",
                    "fg_pct",
                    "fg3_pct",
                    "ft_pct",
                    "trend",
                    "consistency",
                    "home_advantage",
                ];
                let mut names = team("home", &cols);
                names.extend(team("away", &cols));
                names
            }
            FeatureLayout::Reduced => {
                let cols = ["avg_points", "recent_points", "fg_pct", "trend"];
                let mut names = team("home", &cols);
                names.extend(team("away", &cols));
                names.push("advantage_gap".to_string());
                names
            }
        }
    }
}

fn full_team_columns(s: &TeamFeatureSummary) -> Vec<f64> {
    vec![
        s.avg_points,
        s.recent_points,
        s.fg_pct,
        s.fg3_pct,
        s.ft_pct,
        s.trend,
        s.consistency,
        s.home_advantage,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_dimensions() {
        let home = TeamFeatureSummary::default_for(Role::Home);
        let away = TeamFeatureSummary::default_for(Role::Away);

        for layout in [FeatureLayout::Full, FeatureLayout::Reduced] {
            let v = layout.build(&home, &away).unwrap();
            assert_eq!(v.len(), layout.dim());
            assert_eq!(layout.column_names().len(), layout.dim());
        }
    }

    #[test]
    fn test_full_layout_order() {
        let mut home = TeamFeatureSummary::default_for(Role::Home);
        home.avg_points = 118.0;
        let mut away = TeamFeatureSummary::default_for(Role::Away);
        away.ft_pct = 0.81;

        let v = FeatureLayout::Full.build(&home, &away).unwrap();
        assert_eq!(v[0], 118.0);
        assert_eq!(v[7], 1.05);
        assert_eq!(v[12], 0.81);
        assert_eq!(v[15], 0.95);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut home = TeamFeatureSummary::default_for(Role::Home);
        home.trend = f64::NAN;
        let away = TeamFeatureSummary::default_for(Role::Away);
        assert!(FeatureLayout::Reduced.build(&home, &away).is_none());
    }
}
