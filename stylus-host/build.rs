//! Build script for stylus-host
//!
//! - Validates plotter.toml at compile time

use std::fs;

fn main() {
    validate_config();
}

/// Validate plotter.toml configuration at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=plotter.toml");
    println!("cargo:rerun-if-changed=build.rs");

    let text = fs::read_to_string("plotter.toml")
        .unwrap_or_else(|e| panic!("cannot read plotter.toml: {}", e));
    let config: toml::Value = toml::from_str(&text)
        .unwrap_or_else(|e| panic!("invalid TOML in plotter.toml:\n{}", e));

    report("Missing required sections", required_sections(&config));
    report("Invalid [robot] configuration", robot_errors(&config));
    report("Invalid [[waypoint]] list", waypoint_errors(&config));

    println!("cargo:warning=plotter.toml validated successfully");
}

/// Abort the build listing every error under `title`
fn report(title: &str, errors: Vec<String>) {
    if errors.is_empty() {
        return;
    }
    panic!("{} in plotter.toml:\n  - {}", title, errors.join("\n  - "));
}

fn required_sections(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();
    if config.get("link").is_none() {
        errors.push("Missing [link] section".to_string());
    }
    match config.get("waypoint") {
        Some(toml::Value::Array(list)) if !list.is_empty() => {}
        _ => errors.push("Missing [[waypoint]] entries - at least one is required".to_string()),
    }
    errors
}

fn number(value: Option<&toml::Value>) -> Option<f64> {
    match value {
        Some(toml::Value::Float(f)) => Some(*f),
        Some(toml::Value::Integer(i)) => Some(*i as f64),
        _ => None,
    }
}

/// Range checks on the numeric robot fields that are present
fn robot_errors(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();
    let robot = match config.get("robot") {
        Some(toml::Value::Table(t)) => t,
        Some(_) => return vec!["[robot] must be a table".to_string()],
        None => return errors,
    };

    if let Some(arm) = robot.get("arm") {
        for key in ["l1_mm", "l2_mm"] {
            if let Some(len) = number(arm.get(key)) {
                if len <= 0.0 {
                    errors.push(format!("[robot.arm] {} must be positive", key));
                }
            }
        }
        if let Some(eps) = number(arm.get("reach_epsilon_mm")) {
            if eps <= 0.0 {
                errors.push("[robot.arm] reach_epsilon_mm must be positive".to_string());
            }
        }
    }

    for joint in ["joint1", "joint2"] {
        let Some(drive) = robot.get(joint) else {
            continue;
        };
        for key in [
            "full_steps_per_rotation",
            "microsteps",
            "gear_ratio_num",
            "gear_ratio_den",
        ] {
            if let Some(toml::Value::Integer(v)) = drive.get(key) {
                if *v <= 0 {
                    errors.push(format!("[robot.{}] {} must be positive", joint, key));
                }
            }
        }
    }

    if let Some(motion) = robot.get("motion") {
        if let Some(toml::Value::Integer(tick)) = motion.get("tick_ms") {
            if *tick <= 0 || *tick > 1000 {
                errors.push("[robot.motion] tick_ms must be 1-1000".to_string());
            }
        }
        for key in ["travel_speed_mm_s", "draw_speed_mm_s"] {
            if let Some(speed) = number(motion.get(key)) {
                if speed <= 0.0 {
                    errors.push(format!("[robot.motion] {} must be positive", key));
                }
            }
        }
    }

    if let Some(handshake) = robot.get("handshake") {
        for key in ["position_register", "enable_bit", "pen_bit"] {
            if let Some(toml::Value::String(name)) = handshake.get(key) {
                if name.is_empty() || name.len() > 8 {
                    errors.push(format!("[robot.handshake] {} must be 1-8 characters", key));
                }
            }
        }
    }

    errors
}

fn waypoint_errors(config: &toml::Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(toml::Value::Array(list)) = config.get("waypoint") else {
        return errors;
    };

    for (i, wp) in list.iter().enumerate() {
        let Some(wp) = wp.as_table() else {
            errors.push(format!("waypoint {} must be a table", i));
            continue;
        };
        for key in ["x", "y"] {
            if number(wp.get(key)).is_none() {
                errors.push(format!("waypoint {} missing numeric '{}'", i, key));
            }
        }
        if let Some(pen) = wp.get("pen") {
            if !matches!(pen.as_str(), Some("up") | Some("down")) {
                errors.push(format!("waypoint {} pen must be 'up' or 'down'", i));
            }
        }
    }
    errors
}
