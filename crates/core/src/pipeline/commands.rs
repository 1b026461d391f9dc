//! Command lines of the external processing stages.
//!
//! Output arguments carry only the file name: every stage runs inside the
//! working directory and its products are relocated afterwards.

use std::path::Path;

use crate::config::{DestripingConfig, ExecutablesConfig};
use crate::process::StageCommand;
use crate::scene::Platform;

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `modis_L1A --verbose --mission=<T|A> --startnudge=N --stopnudge=N -o<l1a> <primary>`
pub fn level1a_command(
    executables: &ExecutablesConfig,
    platform: Platform,
    startnudge: u32,
    endnudge: u32,
    level1a: &Path,
    primary: &Path,
) -> StageCommand {
    StageCommand::new(&executables.modis_l1a)
        .arg("--verbose")
        .arg(format!("--mission={}", platform.mission()))
        .arg(format!("--startnudge={}", startnudge))
        .arg(format!("--stopnudge={}", endnudge))
        .arg(format!("-o{}", base_name(level1a)))
        .arg(primary)
}

/// The SPA GBAD wrapper turning Aqua packets into attitude and ephemeris.
///
/// The configuration file is passed only when it exists.
pub fn gbad_command(
    executables: &ExecutablesConfig,
    packet: &Path,
    attitude: &Path,
    ephemeris: &Path,
) -> StageCommand {
    let mut cmd = StageCommand::new(executables.spa_home.join("wrapper/gbad/run"))
        .arg("aqua.gbad.pds")
        .arg(packet)
        .arg("aqua.gbad_att")
        .arg(attitude)
        .arg("aqua.gbad_eph")
        .arg(ephemeris);

    if let Some(config_file) = executables
        .spa_config_file
        .as_deref()
        .filter(|path| path.exists())
    {
        cmd = cmd.arg("configurationfile").arg(config_file);
    }
    cmd
}

/// Geolocation command line.
///
/// With attitude and ephemeris the Aqua option list is used and the files
/// are passed as `--att1`/`--eph1`; otherwise the Terra option list.
pub fn geo_command_line(
    executables: &ExecutablesConfig,
    mod01: &Path,
    mod03: &Path,
    attitude_ephemeris: Option<(&Path, &Path)>,
) -> StageCommand {
    let mut cmd = StageCommand::new(&executables.modis_geo);

    match attitude_ephemeris {
        Some((attitude, ephemeris)) => {
            cmd = cmd
                .args(&executables.geo_options_aqua)
                .arg(format!("--att1={}", attitude.display()))
                .arg(format!("--eph1={}", ephemeris.display()));
        }
        None => {
            cmd = cmd.args(&executables.geo_options_terra);
        }
    }

    cmd.arg(format!("-o{}", base_name(mod03))).arg(mod01)
}

/// `modis_L1B --okm=<1km> --hkm=<500m> --qkm=<250m> <mod01> <mod03>`
pub fn level1b_command(
    executables: &ExecutablesConfig,
    level1b_1km: &Path,
    level1b_500m: &Path,
    level1b_250m: &Path,
    mod01: &Path,
    mod03: &Path,
) -> StageCommand {
    StageCommand::new(&executables.modis_l1b)
        .arg(format!("--okm={}", base_name(level1b_1km)))
        .arg(format!("--hkm={}", base_name(level1b_500m)))
        .arg(format!("--qkm={}", base_name(level1b_250m)))
        .arg(mod01)
        .arg(mod03)
}

/// Destriping of the 1 km product with the platform's coefficients.
pub fn destripe_command(
    destriping: &DestripingConfig,
    platform: Platform,
    level1b_1km: &Path,
) -> StageCommand {
    StageCommand::new(destriping.executable_path())
        .arg(base_name(level1b_1km))
        .arg(destriping.coefficient_file(platform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn executables() -> ExecutablesConfig {
        let config: Config = toml::from_str(crate::config::types::MINIMAL_TOML).unwrap();
        let mut exe = config.executables;
        exe.modis_geo = PathBuf::from("script");
        exe.geo_options_terra = vec![
            "--verbose".into(),
            "--enable-dem".into(),
            "--entrained".into(),
            "--disable-download".into(),
        ];
        exe.geo_options_aqua = vec![
            "--verbose".into(),
            "--enable-dem".into(),
            "--disable-download".into(),
        ];
        exe
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_geo_command_line_terra() {
        let exe = executables();
        let cmd = geo_command_line(&exe, Path::new("/a/b/mod01"), Path::new("geo.hdf"), None);

        let mut expected = strings(&["script"]);
        expected.extend(exe.geo_options_terra.clone());
        expected.extend(strings(&["-ogeo.hdf", "/a/b/mod01"]));
        assert_eq!(cmd.to_argv(), expected);
    }

    #[test]
    fn test_geo_command_line_aqua() {
        let exe = executables();
        let cmd = geo_command_line(
            &exe,
            Path::new("/a/b/mod01"),
            Path::new("geo.hdf"),
            Some((Path::new("/x.att"), Path::new("/x.eph"))),
        );

        let mut expected = strings(&["script"]);
        expected.extend(exe.geo_options_aqua.clone());
        expected.extend(strings(&[
            "--att1=/x.att",
            "--eph1=/x.eph",
            "-ogeo.hdf",
            "/a/b/mod01",
        ]));
        assert_eq!(cmd.to_argv(), expected);
    }

    #[test]
    fn test_geo_command_line_without_options() {
        let mut exe = executables();
        exe.geo_options_terra.clear();
        let cmd = geo_command_line(&exe, Path::new("/a/b/mod01"), Path::new("/l1b/geo.hdf"), None);
        assert_eq!(cmd.to_argv(), strings(&["script", "-ogeo.hdf", "/a/b/mod01"]));
    }

    #[test]
    fn test_level1a_command() {
        let exe = executables();
        let cmd = level1a_command(
            &exe,
            Platform::Aqua,
            5,
            5,
            Path::new("/data/l1b/Aqua_MODIS_l1a_21286_132853_2021286134501.hdf"),
            Path::new("/data/lvl0/P1540064AAAAAAAAAAAAAA21286132853001.PDS"),
        );
        assert_eq!(
            cmd.to_argv(),
            strings(&[
                "/opt/ocssw/bin/modis_L1A",
                "--verbose",
                "--mission=A",
                "--startnudge=5",
                "--stopnudge=5",
                "-oAqua_MODIS_l1a_21286_132853_2021286134501.hdf",
                "/data/lvl0/P1540064AAAAAAAAAAAAAA21286132853001.PDS",
            ])
        );
    }

    #[test]
    fn test_gbad_command_skips_missing_config_file() {
        let mut exe = executables();
        exe.spa_config_file = Some(PathBuf::from("/nonexistent/smhi_configfile"));
        let cmd = gbad_command(
            &exe,
            Path::new("/lvl0/packet.PDS"),
            Path::new("/att/packet.att"),
            Path::new("/eph/packet.eph"),
        );
        assert_eq!(
            cmd.to_argv(),
            strings(&[
                "/opt/spa/wrapper/gbad/run",
                "aqua.gbad.pds",
                "/lvl0/packet.PDS",
                "aqua.gbad_att",
                "/att/packet.att",
                "aqua.gbad_eph",
                "/eph/packet.eph",
            ])
        );
    }

    #[test]
    fn test_gbad_command_with_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_file = dir.path().join("smhi_configfile");
        std::fs::write(&config_file, b"").unwrap();

        let mut exe = executables();
        exe.spa_config_file = Some(config_file.clone());
        let argv = gbad_command(
            &exe,
            Path::new("/lvl0/packet.PDS"),
            Path::new("/att/packet.att"),
            Path::new("/eph/packet.eph"),
        )
        .to_argv();
        assert_eq!(argv[7], "configurationfile");
        assert_eq!(argv[8], config_file.to_string_lossy());
    }

    #[test]
    fn test_level1b_and_destripe_commands() {
        let exe = executables();
        let cmd = level1b_command(
            &exe,
            Path::new("/l1b/MOD021km.hdf"),
            Path::new("/l1b/MOD02Hkm.hdf"),
            Path::new("/l1b/MOD02Qkm.hdf"),
            Path::new("/l1b/MOD01.hdf"),
            Path::new("/l1b/MOD03.hdf"),
        );
        assert_eq!(
            cmd.to_argv(),
            strings(&[
                "/opt/ocssw/bin/modis_L1B",
                "--okm=MOD021km.hdf",
                "--hkm=MOD02Hkm.hdf",
                "--qkm=MOD02Qkm.hdf",
                "/l1b/MOD01.hdf",
                "/l1b/MOD03.hdf",
            ])
        );

        let destriping = DestripingConfig {
            enabled: true,
            home: PathBuf::from("/opt/destripe"),
            executable: "MOD_PRDS_DB.exe".into(),
            terra_coeff: "terra.coeff".into(),
            aqua_coeff: "aqua.coeff".into(),
        };
        let cmd = destripe_command(&destriping, Platform::Terra, Path::new("/l1b/MOD021km.hdf"));
        assert_eq!(
            cmd.to_argv(),
            strings(&[
                "/opt/destripe/bin/MOD_PRDS_DB.exe",
                "MOD021km.hdf",
                "/opt/destripe/coeff/terra.coeff",
            ])
        );
    }
}
