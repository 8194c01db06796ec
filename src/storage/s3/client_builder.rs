use std::time::Duration;

use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::stalled_stream_protection::StalledStreamProtectionConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, ConfigLoader, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Builder, Credentials};

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3thaw";

impl ClientConfig {
    /// Build an S3 client from this configuration.
    pub async fn create_client(&self) -> Client {
        let sdk_config = self.load_sdk_config().await;

        let mut builder = Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .accelerate(self.accelerate);

        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Client::from_conf(builder.build())
    }

    async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(self.build_region_provider())
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        config_loader = self.load_credentials(config_loader);

        if self.disable_stalled_stream_protection {
            config_loader =
                config_loader.stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        } else {
            config_loader = config_loader
                .stalled_stream_protection(StalledStreamProtectionConfig::enabled().build());
        }

        config_loader.load().await
    }

    fn load_credentials(&self, config_loader: ConfigLoader) -> ConfigLoader {
        match &self.credential {
            S3Credentials::Credentials { access_keys } => {
                let credentials = Credentials::new(
                    access_keys.access_key.to_string(),
                    access_keys.secret_access_key.to_string(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                );
                config_loader.credentials_provider(credentials)
            }
            S3Credentials::Profile(profile_name) => {
                let mut profile_files = aws_config::profile::profile_file::ProfileFiles::builder()
                    .include_default_config_file(true)
                    .include_default_credentials_file(true);
                if let Some(aws_config_file) = &self.client_config_location.aws_config_file {
                    profile_files = profile_files.with_file(
                        aws_config::profile::profile_file::ProfileFileKind::Config,
                        aws_config_file,
                    );
                }
                if let Some(aws_shared_credentials_file) =
                    &self.client_config_location.aws_shared_credentials_file
                {
                    profile_files = profile_files.with_file(
                        aws_config::profile::profile_file::ProfileFileKind::Credentials,
                        aws_shared_credentials_file,
                    );
                }
                config_loader
                    .profile_name(profile_name)
                    .profile_files(profile_files.build())
            }
            S3Credentials::FromEnvironment => config_loader,
        }
    }

    fn build_region_provider(&self) -> RegionProviderChain {
        let region = self.region.clone().map(Region::new);
        RegionProviderChain::first_try(region).or_default_provider()
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();

        if let Some(millis) = timeouts.operation_timeout_milliseconds {
            builder = builder.operation_timeout(Duration::from_millis(millis));
        }
        if let Some(millis) = timeouts.operation_attempt_timeout_milliseconds {
            builder = builder.operation_attempt_timeout(Duration::from_millis(millis));
        }
        if let Some(millis) = timeouts.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(millis));
        }
        if let Some(millis) = timeouts.read_timeout_milliseconds {
            builder = builder.read_timeout(Duration::from_millis(millis));
        }

        builder.build()
    }
}
